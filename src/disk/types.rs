/// 每个逻辑块（Block）的大小：4KB
/// 文件系统以“块”为最小读写单位。
pub const BLOCK_SIZE: usize = 4096;

/// 定义一个逻辑块类型（每块 4KB 的字节数组）
/// 所有磁盘读写都以 Block 为单位进行。
pub type Block = [u8; BLOCK_SIZE];
