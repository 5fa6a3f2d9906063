use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    sync::Mutex,
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// 虚拟磁盘：一个固定大小的普通文件，按 4KB 块寻址。
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    disk_size: u64,
}

impl FileDisk {
    pub fn new(path: &str, disk_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        if file.metadata()?.len() < disk_size {
            file.set_len(disk_size)?;
        }

        Ok(Self {
            file: Mutex::new(file),
            disk_size,
        })
    }

    pub fn disk_size(&self) -> u64 {
        self.disk_size
    }

    /// 磁盘被划分为多少个逻辑块
    pub fn total_blocks(&self) -> u32 {
        (self.disk_size / BLOCK_SIZE as u64) as u32
    }

    /// 越界检查：块的末尾不能超过磁盘末尾
    fn check_bounds(&self, block_id: u32) -> Result<()> {
        let end = (block_id as u64 + 1) * BLOCK_SIZE as u64;
        if end > self.disk_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("block {} out of range", block_id),
            ));
        }
        Ok(())
    }

    /// 把所有修改刷到底层文件（close 时调用）
    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock().unwrap();
        file.sync_all()
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        self.check_bounds(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        self.check_bounds(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        // 写入立即落盘，保证调用返回前数据已持久化
        file.sync_data()?;
        Ok(())
    }
}
