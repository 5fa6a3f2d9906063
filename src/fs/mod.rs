use std::path::Path;

use crate::{
    disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE},
    fs::{
        config::{FAT_EOC, FAT_EOF, PARENT_MARKER, SUPER_BLOCK_ID},
        entry::{Entry, EntryType},
        error::{FileSystemError, Result},
        fat::Fat,
        super_block::SuperBlock,
    },
    utils::current_timestamp,
};

pub mod config;
pub mod entry;
pub mod error;
pub mod fat;
pub mod super_block;

/// 文件系统：组合磁盘、超级块和 FAT，对外提供复合操作。
/// 超级块和 FAT 不常驻内存：每个操作开始时整体读入工作副本，
/// 成功路径的最后按 “先 FAT、后超级块” 的顺序整体写回。
/// 中途失败不回滚（崩溃一致性是明确的非目标）。
#[derive(Debug)]
pub struct FileSystem {
    disk: FileDisk, // 底层磁盘抽象层
}

impl FileSystem {
    /// format 是进入 mounted 状态的唯一入口。
    /// 镜像已存在时只做挂载，不重新初始化，也不校验内容。
    pub fn format(path: &str, disk_size: u64) -> Result<Self> {
        let exists = Path::new(path).exists();
        let disk = FileDisk::new(path, disk_size)?;
        let fs = Self { disk };
        if exists {
            return Ok(fs);
        }

        let mut sb = SuperBlock::new(path, disk_size);
        let mut fat = Fat::new(sb.total_blocks());

        // 保留块通过普通的分配原语获得。空闲链表初始按块号升序，
        // 所以超级块拿到 0 号块，FAT 的块正好跟在它后面——
        // 这个顺序耦合是布局成立的前提。
        let sb_block = fat
            .allocate_block(&mut sb)
            .ok_or(FileSystemError::DiskFull)?;
        debug_assert_eq!(sb_block, SUPER_BLOCK_ID);
        for _ in 0..sb.fat_blocks() {
            fat.append_to_chain(&mut sb, SUPER_BLOCK_ID)
                .ok_or(FileSystemError::DiskFull)?;
        }
        fs.sync_metadata(&fat, &sb)?;

        // 根目录
        let root_block = fat
            .allocate_block(&mut sb)
            .ok_or(FileSystemError::DiskFull)?;
        let root = Entry::root(root_block);
        entry::write_entry(&fs.disk, &root)?;
        fs.sync_metadata(&fat, &sb)?;

        Ok(fs)
    }

    /// 根目录的块号：紧跟在保留块之后
    pub fn root_block(&self) -> u32 {
        let total = self.disk.total_blocks();
        let fat_bytes = total as u64 * 4;
        let fat_blocks = ((fat_bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32;
        1 + fat_blocks
    }

    /// 读入超级块和 FAT 的工作副本
    fn load_metadata(&self) -> Result<(SuperBlock, Fat)> {
        let sb = SuperBlock::load(&self.disk)?;
        let fat = Fat::load(&self.disk, self.disk.total_blocks())?;
        Ok((sb, fat))
    }

    /// 整体写回：先 FAT，后超级块
    fn sync_metadata(&self, fat: &Fat, sb: &SuperBlock) -> Result<()> {
        fat.sync(&self.disk)?;
        sb.sync(&self.disk)
    }

    /// 在 parent 的子项里按名字和类型查找，返回 (槽位, 条目)。
    /// 类型参与匹配：同名的文件和目录允许共存。
    fn find_child(
        &self,
        parent: &Entry,
        name: &str,
        entry_type: EntryType,
    ) -> Result<Option<(usize, Entry)>> {
        for (slot, block) in parent.child_slots() {
            let child = entry::read_entry_at(&self.disk, block)?;
            if child.name() == name && child.entry_type == entry_type {
                return Ok(Some((slot, child)));
            }
        }
        Ok(None)
    }

    /// mkdir / touch 的公共部分：分配头块、写入新条目、登记到父目录
    fn create_entry(&mut self, name: &str, parent_block: u32, entry_type: EntryType) -> Result<u32> {
        let (mut sb, mut fat) = self.load_metadata()?;
        if sb.free_blocks == 0 {
            return Err(FileSystemError::DiskFull);
        }
        let mut parent = entry::read_entry_at(&self.disk, parent_block)?;
        if self.find_child(&parent, name, entry_type)?.is_some() {
            return Err(FileSystemError::AlreadyExists(name.to_string()));
        }
        // 槽位先于分配检查：目录满时不留下游离的块
        if !parent.has_free_slot() {
            return Err(FileSystemError::DirectoryFull(parent.name()));
        }

        let block = fat
            .allocate_block(&mut sb)
            .ok_or(FileSystemError::DiskFull)?;
        let new_entry = Entry::new(name, entry_type, block, parent_block);
        entry::write_entry(&self.disk, &new_entry)?;

        parent.add_child(block)?;
        entry::write_entry(&self.disk, &parent)?;
        self.sync_metadata(&fat, &sb)?;
        Ok(block)
    }

    pub fn create_directory(&mut self, name: &str, parent_block: u32) -> Result<u32> {
        self.create_entry(name, parent_block, EntryType::Directory)
    }

    pub fn create_file(&mut self, name: &str, parent_block: u32) -> Result<u32> {
        self.create_entry(name, parent_block, EntryType::File)
    }

    /// rmdir：只允许删除空目录（没有任何非零子槽）
    pub fn remove_directory(&mut self, name: &str, parent_block: u32) -> Result<()> {
        let (mut sb, mut fat) = self.load_metadata()?;
        let mut parent = entry::read_entry_at(&self.disk, parent_block)?;
        let (slot, dir) = self
            .find_child(&parent, name, EntryType::Directory)?
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;
        if dir.has_children() {
            return Err(FileSystemError::DirectoryNotEmpty(name.to_string()));
        }

        fat.deallocate_chain(&mut sb, dir.current_block);
        parent.remove_child(slot);
        entry::write_entry(&self.disk, &parent)?;
        self.sync_metadata(&fat, &sb)
    }

    /// rm：头块和数据链对分配器来说是同一条链，一次遍历全部释放
    pub fn remove_file(&mut self, name: &str, parent_block: u32) -> Result<()> {
        let (mut sb, mut fat) = self.load_metadata()?;
        let mut parent = entry::read_entry_at(&self.disk, parent_block)?;
        let (slot, file) = self
            .find_child(&parent, name, EntryType::File)?
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        fat.deallocate_chain(&mut sb, file.current_block);
        parent.remove_child(slot);
        entry::write_entry(&self.disk, &parent)?;
        self.sync_metadata(&fat, &sb)
    }

    /// append：在链尾按 size % BLOCK_SIZE 的偏移继续写，
    /// 需要时向链尾追加新块。size 始终等于实际写入的字节数（没有空洞）。
    pub fn append_to_file(&mut self, name: &str, parent_block: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let (mut sb, mut fat) = self.load_metadata()?;
        let parent = entry::read_entry_at(&self.disk, parent_block)?;
        let (_, mut file) = self
            .find_child(&parent, name, EntryType::File)?
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        let header = file.current_block;
        // 先算清楚需要多少新块，空间不够就整体拒绝，不制造半成品
        let tail_room = if fat.get(header) == FAT_EOC {
            0
        } else {
            (BLOCK_SIZE - file.size as usize % BLOCK_SIZE) % BLOCK_SIZE
        };
        let needed = data
            .len()
            .saturating_sub(tail_room)
            .div_ceil(BLOCK_SIZE) as u32;
        if sb.free_blocks < needed {
            return Err(FileSystemError::DiskFull);
        }

        let mut offset = file.size as usize % BLOCK_SIZE;
        let mut terminal = if fat.get(header) == FAT_EOC {
            // 还没有数据块，先挂第一块
            offset = 0;
            fat.append_to_chain(&mut sb, header)
                .ok_or(FileSystemError::DiskFull)?
        } else if file.size > 0 && offset == 0 {
            // 终端块已写满
            fat.append_to_chain(&mut sb, header)
                .ok_or(FileSystemError::DiskFull)?
        } else {
            fat.terminal(header)
        };

        let mut remaining = data;
        let mut buf: Block = [0; BLOCK_SIZE];
        while !remaining.is_empty() {
            let chunk = remaining.len().min(BLOCK_SIZE - offset);
            self.disk.read_block(terminal, &mut buf)?;
            buf[offset..offset + chunk].copy_from_slice(&remaining[..chunk]);
            self.disk.write_block(terminal, &buf)?;
            file.size += chunk as u32;
            remaining = &remaining[chunk..];
            if !remaining.is_empty() {
                terminal = fat
                    .append_to_chain(&mut sb, header)
                    .ok_or(FileSystemError::DiskFull)?;
                offset = 0;
            }
        }

        file.modified = current_timestamp();
        entry::write_entry(&self.disk, &file)?;
        self.sync_metadata(&fat, &sb)
    }

    /// cat：从第一个数据块（fat[header]，不是头块本身）开始，
    /// 沿链读出 size 个字节
    pub fn read_file(&self, name: &str, parent_block: u32) -> Result<Vec<u8>> {
        let fat = Fat::load(&self.disk, self.disk.total_blocks())?;
        let parent = entry::read_entry_at(&self.disk, parent_block)?;
        let (_, file) = self
            .find_child(&parent, name, EntryType::File)?
            .ok_or_else(|| FileSystemError::NotFound(name.to_string()))?;

        let mut out = Vec::with_capacity(file.size as usize);
        let mut remaining = file.size as usize;
        let mut block = fat.get(file.current_block);
        let mut buf: Block = [0; BLOCK_SIZE];
        while remaining > 0 && block != FAT_EOC && block != FAT_EOF {
            self.disk.read_block(block, &mut buf)?;
            let chunk = remaining.min(BLOCK_SIZE);
            out.extend_from_slice(&buf[..chunk]);
            remaining -= chunk;
            block = fat.get(block);
        }
        Ok(out)
    }

    /// ls：读出目录下所有非零子槽对应的条目
    pub fn list_directory(&self, dir_block: u32) -> Result<Vec<Entry>> {
        let dir = entry::read_entry_at(&self.disk, dir_block)?;
        let mut entries = Vec::new();
        for (_, block) in dir.child_slots() {
            entries.push(entry::read_entry_at(&self.disk, block)?);
        }
        Ok(entries)
    }

    /// cd：".." 沿父链接向上，否则在子项里找同名目录。
    /// 出错时调用方保持游标不变。
    pub fn change_directory(&self, name: &str, cursor: u32) -> Result<u32> {
        let current = entry::read_entry_at(&self.disk, cursor)?;
        if name == PARENT_MARKER {
            if current.parent_block == FAT_EOF {
                return Err(FileSystemError::AlreadyAtRoot);
            }
            return Ok(current.parent_block);
        }
        match self.find_child(&current, name, EntryType::Directory)? {
            Some((_, child)) => Ok(child.current_block),
            None => Err(FileSystemError::NotFound(name.to_string())),
        }
    }

    /// pwd：从游标沿父链接重建路径
    pub fn current_path(&self, cursor: u32) -> Result<String> {
        entry::reconstruct_path(&self.disk, cursor)
    }

    /// info 命令用：超级块的只读快照
    pub fn volume_info(&self) -> Result<SuperBlock> {
        SuperBlock::load(&self.disk)
    }

    pub fn free_blocks(&self) -> Result<u32> {
        Ok(SuperBlock::load(&self.disk)?.free_blocks)
    }

    pub fn fat_snapshot(&self) -> Result<Fat> {
        Fat::load(&self.disk, self.disk.total_blocks())
    }

    /// close：把底层文件刷盘后丢弃挂载状态
    pub fn close(self) -> Result<()> {
        self.disk.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::config::MAX_DIR_ENTRIES;

    const MB: u64 = 1024 * 1024;

    fn temp_image() -> String {
        std::env::temp_dir()
            .join(format!("fat-shell-{}.img", uuid::Uuid::new_v4()))
            .to_str()
            .unwrap()
            .to_string()
    }

    fn check_conservation(fs: &FileSystem) {
        let (sb, fat) = fs.load_metadata().unwrap();
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);
    }

    #[test]
    fn format_lays_out_reserved_blocks_and_root() {
        let path = temp_image();
        let fs = FileSystem::format(&path, 16 * MB).unwrap();

        // 16MB：保留块 0..=4，根目录在 5 号块
        assert_eq!(fs.root_block(), 5);
        let root = entry::read_entry_at(&fs.disk, 5).unwrap();
        assert_eq!(root.name(), "/");
        assert!(root.is_directory());
        assert_eq!(root.parent_block, FAT_EOF);

        let sb = fs.volume_info().unwrap();
        assert_eq!(sb.total_blocks(), 4096);
        // 4096 块 - 5 个保留块 - 1 个根目录块
        assert_eq!(sb.free_blocks, 4090);
        check_conservation(&fs);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn format_on_existing_image_is_idempotent() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();
        fs.create_directory("keep", root).unwrap();
        let info_before = fs.volume_info().unwrap();
        fs.close().unwrap();

        // 第二次 format 只是打开，不重新初始化
        let fs = FileSystem::format(&path, 16 * MB).unwrap();
        let info_after = fs.volume_info().unwrap();
        assert_eq!(info_after.free_blocks, info_before.free_blocks);
        assert_eq!(info_after.volume_id, info_before.volume_id);
        let names: Vec<String> = fs
            .list_directory(root)
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["keep".to_string()]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn end_to_end_append_cat_remove() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();
        let free_before = fs.free_blocks().unwrap();

        fs.create_file("f.txt", root).unwrap();
        fs.append_to_file("f.txt", root, b"hello").unwrap();
        fs.append_to_file("f.txt", root, b" world").unwrap();
        assert_eq!(fs.read_file("f.txt", root).unwrap(), b"hello world");
        check_conservation(&fs);

        fs.remove_file("f.txt", root).unwrap();
        assert!(fs.list_directory(root).unwrap().is_empty());
        assert_eq!(fs.free_blocks().unwrap(), free_before);
        check_conservation(&fs);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn cat_of_empty_file_is_empty() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();
        fs.create_file("empty", root).unwrap();
        assert!(fs.read_file("empty", root).unwrap().is_empty());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn append_spanning_multiple_blocks_roundtrips() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();
        fs.create_file("big", root).unwrap();

        // 先写满一块再多一点，再补一段，覆盖跨块和整块边界两种情况
        let first: Vec<u8> = (0..BLOCK_SIZE + 100).map(|i| (i % 251) as u8).collect();
        let second: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| (i % 13) as u8).collect();
        fs.append_to_file("big", root, &first).unwrap();
        fs.append_to_file("big", root, &second).unwrap();

        let mut expected = first.clone();
        expected.extend_from_slice(&second);
        assert_eq!(fs.read_file("big", root).unwrap(), expected);
        check_conservation(&fs);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn same_name_different_type_may_coexist() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();

        fs.create_file("x", root).unwrap();
        // 同名目录允许：碰撞检查只看同类型
        fs.create_directory("x", root).unwrap();
        assert!(matches!(
            fs.create_file("x", root),
            Err(FileSystemError::AlreadyExists(_))
        ));
        assert!(matches!(
            fs.create_directory("x", root),
            Err(FileSystemError::AlreadyExists(_))
        ));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn directory_fanout_is_bounded() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();
        let free_before = fs.free_blocks().unwrap();

        for i in 0..MAX_DIR_ENTRIES {
            fs.create_file(&format!("f{}", i), root).unwrap();
        }
        assert!(matches!(
            fs.create_file("one-too-many", root),
            Err(FileSystemError::DirectoryFull(_))
        ));

        // 已有子项完好，没有块被悄悄泄漏
        let entries = fs.list_directory(root).unwrap();
        assert_eq!(entries.len(), MAX_DIR_ENTRIES);
        assert_eq!(
            fs.free_blocks().unwrap(),
            free_before - MAX_DIR_ENTRIES as u32
        );
        check_conservation(&fs);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn remove_directory_requires_empty() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();

        let sub = fs.create_directory("sub", root).unwrap();
        fs.create_file("inner", sub).unwrap();
        assert!(matches!(
            fs.remove_directory("sub", root),
            Err(FileSystemError::DirectoryNotEmpty(_))
        ));

        fs.remove_file("inner", sub).unwrap();
        fs.remove_directory("sub", root).unwrap();
        assert!(fs.list_directory(root).unwrap().is_empty());
        check_conservation(&fs);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn change_directory_walks_up_and_down() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();

        let sub = fs.create_directory("sub", root).unwrap();
        assert_eq!(fs.change_directory("sub", root).unwrap(), sub);
        assert_eq!(fs.change_directory("..", sub).unwrap(), root);
        assert!(matches!(
            fs.change_directory("..", root),
            Err(FileSystemError::AlreadyAtRoot)
        ));
        assert!(matches!(
            fs.change_directory("missing", root),
            Err(FileSystemError::NotFound(_))
        ));
        // 文件不是 cd 的目标
        fs.create_file("plain", root).unwrap();
        assert!(matches!(
            fs.change_directory("plain", root),
            Err(FileSystemError::NotFound(_))
        ));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn path_reconstruction_from_nested_cursor() {
        let path = temp_image();
        let mut fs = FileSystem::format(&path, 16 * MB).unwrap();
        let root = fs.root_block();

        assert_eq!(fs.current_path(root).unwrap(), "/");
        let b = fs.create_directory("b", root).unwrap();
        let a = fs.create_directory("a", b).unwrap();
        assert_eq!(fs.current_path(b).unwrap(), "/b");
        assert_eq!(fs.current_path(a).unwrap(), "/b/a");
        std::fs::remove_file(path).unwrap();
    }
}
