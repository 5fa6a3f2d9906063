use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE},
    fs::{
        config::{MAX_NAME_LEN, SUPER_BLOCK_ID},
        error::{FileSystemError, Result},
    },
};

pub const SUPER_BLOCK_MAGIC: u64 = 0xFA7D15C0;

/// 超级块：卷的全局元信息，固定存放在 0 号块。
/// format 时创建一次，此后每次分配/释放都会更新并整体写回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u64,               // 魔数，用于识别文件系统
    pub volume_id: [u8; 16],      // 卷的唯一标识（v4 uuid）
    name: [u8; MAX_NAME_LEN],     // 卷名（镜像文件名，截断存储）
    pub disk_size: u64,           // 磁盘总大小（字节）
    pub block_size: u64,          // 每块大小（字节）
    pub free_blocks: u32,         // 当前空闲块数
    pub free_list_head: u32,      // 空闲链表头的块号
}

impl SuperBlock {
    pub fn new(name: &str, disk_size: u64) -> Self {
        let mut fixed = [0u8; MAX_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        fixed[..len].copy_from_slice(&bytes[..len]);

        Self {
            magic: SUPER_BLOCK_MAGIC,
            volume_id: Uuid::new_v4().into_bytes(),
            name: fixed,
            disk_size,
            block_size: BLOCK_SIZE as u64,
            // 空闲块数从“全部空闲”起步，只由分配原语递减，
            // 保证它始终等于空闲链表的长度
            free_blocks: (disk_size / BLOCK_SIZE as u64) as u32,
            free_list_head: 0,
        }
    }

    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn volume_id(&self) -> Uuid {
        Uuid::from_bytes(self.volume_id)
    }

    pub fn total_blocks(&self) -> u32 {
        (self.disk_size / self.block_size) as u32
    }

    /// FAT 占用的块数：每个表项 4 字节，向上取整到块边界
    pub fn fat_blocks(&self) -> u32 {
        let fat_bytes = self.total_blocks() as u64 * 4;
        ((fat_bytes + self.block_size - 1) / self.block_size) as u32
    }

    /// 保留块数 = 1 个超级块 + FAT 自身占用的块
    pub fn reserved_blocks(&self) -> u32 {
        1 + self.fat_blocks()
    }

    /// 从 0 号块读出超级块
    pub fn load(disk: &FileDisk) -> Result<Self> {
        let mut buf: Block = [0; BLOCK_SIZE];
        disk.read_block(SUPER_BLOCK_ID, &mut buf)?;
        bincode::deserialize(&buf).map_err(|e| FileSystemError::Corrupted(e.to_string()))
    }

    /// 将超级块整体写回 0 号块（补零到块边界）
    pub fn sync(&self, disk: &FileDisk) -> Result<()> {
        let bytes =
            bincode::serialize(self).map_err(|e| FileSystemError::Corrupted(e.to_string()))?;
        if bytes.len() > BLOCK_SIZE {
            return Err(FileSystemError::EntryTooLarge(bytes.len()));
        }
        let mut buf: Block = [0; BLOCK_SIZE];
        buf[..bytes.len()].copy_from_slice(&bytes);
        disk.write_block(SUPER_BLOCK_ID, &buf)?;
        Ok(())
    }
}
