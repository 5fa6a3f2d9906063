use serde::{Deserialize, Serialize};

use crate::{
    disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE},
    fs::{
        config::{FAT_EOF, MAX_DIR_ENTRIES, MAX_NAME_LEN, ROOT_NAME},
        error::{FileSystemError, Result},
    },
    utils::current_timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    File,
    Directory,
}

/// 目录/文件记录：定长，每条独占一个块。
/// 文件的数据不放在自己的头块里：fat[current_block] 指向第一个数据块。
/// children 只对目录有意义，0 表示空槽——0 号块是超级块，
/// 永远不可能成为某个子项的头块，这是一个隐含不变量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    name: [u8; MAX_NAME_LEN],
    pub entry_type: EntryType,
    pub size: u32,                        // 文件：字节数；目录：已占用的子槽数
    pub children: [u32; MAX_DIR_ENTRIES], // 子项头块的块号数组
    pub parent_block: u32,                // 父目录的块号，根目录为 FAT_EOF
    pub current_block: u32,               // 自己所在的块号
    pub created: u64,
    pub modified: u64,
}

impl Entry {
    pub fn new(name: &str, entry_type: EntryType, current_block: u32, parent_block: u32) -> Self {
        let mut fixed = [0u8; MAX_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        fixed[..len].copy_from_slice(&bytes[..len]);

        let now = current_timestamp();
        Self {
            name: fixed,
            entry_type,
            size: 0,
            children: [0; MAX_DIR_ENTRIES],
            parent_block,
            current_block,
            created: now,
            modified: now,
        }
    }

    /// 根目录：format 时创建的唯一一个没有父目录的条目
    pub fn root(block: u32) -> Self {
        Self::new(ROOT_NAME, EntryType::Directory, block, FAT_EOF)
    }

    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    /// 把子项挂到第一个空槽；没有空槽时报错且不改动内存中的记录
    pub fn add_child(&mut self, child_block: u32) -> Result<()> {
        for slot in self.children.iter_mut() {
            if *slot == 0 {
                *slot = child_block;
                self.size += 1;
                return Ok(());
            }
        }
        Err(FileSystemError::DirectoryFull(self.name()))
    }

    /// 清空指定槽位并递减子项计数
    pub fn remove_child(&mut self, slot: usize) {
        if self.children[slot] != 0 {
            self.children[slot] = 0;
            self.size = self.size.saturating_sub(1);
        }
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(|&b| b != 0)
    }

    pub fn has_free_slot(&self) -> bool {
        self.children.iter().any(|&b| b == 0)
    }

    /// 遍历非零子槽：(槽位, 子项头块号)
    pub fn child_slots(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, &b)| b != 0)
            .map(|(i, &b)| (i, b))
    }
}

/// 把记录序列化进 entry.current_block 所在的块。
/// 记录超过一个块或块号越界都直接报错，不做部分写入。
pub fn write_entry(disk: &FileDisk, entry: &Entry) -> Result<()> {
    if entry.current_block >= disk.total_blocks() {
        return Err(FileSystemError::InvalidBlock(entry.current_block));
    }
    let bytes =
        bincode::serialize(entry).map_err(|e| FileSystemError::Corrupted(e.to_string()))?;
    if bytes.len() > BLOCK_SIZE {
        return Err(FileSystemError::EntryTooLarge(bytes.len()));
    }
    let mut buf: Block = [0; BLOCK_SIZE];
    buf[..bytes.len()].copy_from_slice(&bytes);
    disk.write_block(entry.current_block, &buf)?;
    Ok(())
}

/// 从指定块反序列化一条记录
pub fn read_entry_at(disk: &FileDisk, block: u32) -> Result<Entry> {
    if block >= disk.total_blocks() {
        return Err(FileSystemError::InvalidBlock(block));
    }
    let mut buf: Block = [0; BLOCK_SIZE];
    disk.read_block(block, &mut buf)?;
    bincode::deserialize(&buf).map_err(|e| FileSystemError::Corrupted(e.to_string()))
}

/// 从 cursor 沿 parent_block 一路走到根，重建当前路径。
/// 名字按根到叶的顺序用 / 连接；cursor 就在根目录时得到 "/"。
pub fn reconstruct_path(disk: &FileDisk, cursor: u32) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut block = cursor;
    while block != FAT_EOF {
        let entry = read_entry_at(disk, block)?;
        let name = entry.name();
        if name != ROOT_NAME && !name.is_empty() {
            parts.push(name);
        }
        block = entry.parent_block;
    }
    if parts.is_empty() {
        return Ok(ROOT_NAME.to_string());
    }
    parts.reverse();
    Ok(format!("/{}", parts.join("/")))
}
