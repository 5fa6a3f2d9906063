use crate::{
    disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE},
    fs::{
        config::{FAT_EOC, FAT_EOF, FAT_START_BLOCK_ID},
        error::Result,
        super_block::SuperBlock,
    },
};

/// FAT：每个逻辑块对应一个 u32 表项，
/// 同一张表同时承载空闲链表和各文件的块链。
/// 表项取值：下一块的块号、FAT_EOC（链结束）或 FAT_EOF（表结束/链表耗尽）。
#[derive(Debug, Clone)]
pub struct Fat {
    entries: Vec<u32>,
}

impl Fat {
    /// 初始化空闲链表：fat[i] = i + 1，最后一项为 FAT_EOF。
    /// 链表按块号升序串起所有块（包括将来的超级块和 FAT 自身），
    /// format 依赖这个顺序让保留块恰好落在 0、1、2…号块上。
    pub fn new(total_blocks: u32) -> Self {
        let mut entries: Vec<u32> = (1..=total_blocks).collect();
        if let Some(last) = entries.last_mut() {
            *last = FAT_EOF;
        }
        Self { entries }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn get(&self, block: u32) -> u32 {
        self.entries[block as usize]
    }

    pub fn set(&mut self, block: u32, value: u32) {
        self.entries[block as usize] = value;
    }

    /// 从空闲链表头弹出一个块；耗尽时返回 None。
    pub fn allocate_block(&mut self, sb: &mut SuperBlock) -> Option<u32> {
        if sb.free_blocks == 0 {
            return None;
        }
        let allocated = sb.free_list_head;
        sb.free_list_head = self.get(allocated);
        self.set(allocated, FAT_EOC);
        sb.free_blocks -= 1;
        Some(allocated)
    }

    /// 分配一个块并挂到 chain_head 所在链的末尾，返回新块号。
    /// 查找链尾的开销与链长成正比，文件的链长受卷大小约束，可以接受。
    pub fn append_to_chain(&mut self, sb: &mut SuperBlock, chain_head: u32) -> Option<u32> {
        let new_block = self.allocate_block(sb)?;
        let mut cur = chain_head;
        while self.get(cur) != FAT_EOC {
            cur = self.get(cur);
        }
        self.set(cur, new_block);
        Some(new_block)
    }

    /// 从 start 开始释放整条链：按遍历顺序逐个压回空闲链表头。
    /// start == FAT_EOC 表示链本来就是空的，直接返回。
    pub fn deallocate_chain(&mut self, sb: &mut SuperBlock, start: u32) {
        if start == FAT_EOC {
            return;
        }
        let mut block = start;
        loop {
            let next = self.get(block);
            self.set(block, sb.free_list_head);
            sb.free_list_head = block;
            sb.free_blocks += 1;
            if next == FAT_EOC {
                break;
            }
            block = next;
        }
    }

    /// 链的最后一个块（第一个 FAT 值为 EOC 的块）
    pub fn terminal(&self, chain_head: u32) -> u32 {
        let mut cur = chain_head;
        while self.get(cur) != FAT_EOC {
            cur = self.get(cur);
        }
        cur
    }

    /// 沿空闲链表数出可达的块数，用于校验 free_blocks 不变量
    pub fn free_list_len(&self, sb: &SuperBlock) -> u32 {
        let mut count = 0;
        let mut block = sb.free_list_head;
        while block != FAT_EOF {
            count += 1;
            block = self.get(block);
        }
        count
    }

    /// 从磁盘整体读入 FAT（表项 4 字节小端，从 1 号块开始连续存放）
    pub fn load(disk: &FileDisk, total_blocks: u32) -> Result<Self> {
        let fat_bytes = total_blocks as usize * 4;
        let fat_blocks = (fat_bytes + BLOCK_SIZE - 1) / BLOCK_SIZE;

        let mut raw = Vec::with_capacity(fat_blocks * BLOCK_SIZE);
        let mut buf: Block = [0; BLOCK_SIZE];
        for i in 0..fat_blocks as u32 {
            disk.read_block(FAT_START_BLOCK_ID + i, &mut buf)?;
            raw.extend_from_slice(&buf);
        }
        raw.truncate(fat_bytes);

        let entries = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { entries })
    }

    /// 将 FAT 整体写回磁盘，最后一块补零到块边界。
    /// 没有部分写回：每次都是全量。
    pub fn sync(&self, disk: &FileDisk) -> Result<()> {
        let mut raw: Vec<u8> = Vec::with_capacity(self.entries.len() * 4);
        for entry in &self.entries {
            raw.extend_from_slice(&entry.to_le_bytes());
        }
        let fat_blocks = (raw.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        raw.resize(fat_blocks * BLOCK_SIZE, 0);

        let mut buf: Block = [0; BLOCK_SIZE];
        for i in 0..fat_blocks {
            buf.copy_from_slice(&raw[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]);
            disk.write_block(FAT_START_BLOCK_ID + i as u32, &buf)?;
        }
        Ok(())
    }
}

/// FAT 太大不适合打印，调试时只看前几项
pub fn format_fat_entries(fat: &Fat, count: u32) -> String {
    let mut out = String::new();
    for i in 0..count.min(fat.len()) {
        let value = match fat.get(i) {
            FAT_EOC => "EOC".to_string(),
            FAT_EOF => "EOF".to_string(),
            v => v.to_string(),
        };
        out.push_str(&format!("FAT[{}] = {}\n", i, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(total: u32) -> (Fat, SuperBlock) {
        let fat = Fat::new(total);
        let sb = SuperBlock::new("test.img", total as u64 * BLOCK_SIZE as u64);
        (fat, sb)
    }

    #[test]
    fn free_list_is_threaded_in_ascending_order() {
        let (fat, _) = fresh(8);
        for i in 0..7 {
            assert_eq!(fat.get(i), i + 1);
        }
        assert_eq!(fat.get(7), FAT_EOF);
    }

    #[test]
    fn allocate_pops_blocks_in_ascending_order() {
        let (mut fat, mut sb) = fresh(8);
        for expected in 0..8 {
            let block = fat.allocate_block(&mut sb).unwrap();
            assert_eq!(block, expected);
            assert_eq!(fat.get(block), FAT_EOC);
        }
        assert_eq!(sb.free_blocks, 0);
        assert!(fat.allocate_block(&mut sb).is_none());
    }

    #[test]
    fn append_links_new_terminal() {
        let (mut fat, mut sb) = fresh(8);
        let head = fat.allocate_block(&mut sb).unwrap();
        let second = fat.append_to_chain(&mut sb, head).unwrap();
        let third = fat.append_to_chain(&mut sb, head).unwrap();
        assert_eq!(fat.get(head), second);
        assert_eq!(fat.get(second), third);
        assert_eq!(fat.get(third), FAT_EOC);
        assert_eq!(fat.terminal(head), third);
    }

    #[test]
    fn deallocate_returns_chain_to_free_list() {
        let (mut fat, mut sb) = fresh(8);
        let head = fat.allocate_block(&mut sb).unwrap();
        fat.append_to_chain(&mut sb, head).unwrap();
        fat.append_to_chain(&mut sb, head).unwrap();
        let before = sb.free_blocks;

        fat.deallocate_chain(&mut sb, head);
        assert_eq!(sb.free_blocks, before + 3);
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);
    }

    #[test]
    fn deallocate_empty_chain_is_noop() {
        let (mut fat, mut sb) = fresh(8);
        let before = sb.free_blocks;
        fat.deallocate_chain(&mut sb, FAT_EOC);
        assert_eq!(sb.free_blocks, before);
        assert_eq!(fat.free_list_len(&sb), before);
    }

    #[test]
    fn free_block_count_matches_free_list_length() {
        // 任意分配/追加/释放序列之后，不变量都要成立
        let (mut fat, mut sb) = fresh(32);
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);

        let a = fat.allocate_block(&mut sb).unwrap();
        let b = fat.allocate_block(&mut sb).unwrap();
        fat.append_to_chain(&mut sb, a).unwrap();
        fat.append_to_chain(&mut sb, b).unwrap();
        fat.append_to_chain(&mut sb, a).unwrap();
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);

        fat.deallocate_chain(&mut sb, b);
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);

        fat.deallocate_chain(&mut sb, a);
        assert_eq!(fat.free_list_len(&sb), sb.free_blocks);
        assert_eq!(sb.free_blocks, 32);
    }
}
