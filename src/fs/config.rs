/// 超级块固定在 0 号块
pub const SUPER_BLOCK_ID: u32 = 0;

/// FAT 从 1 号块开始，紧跟超级块
pub const FAT_START_BLOCK_ID: u32 = 1;

/// 链的结束标记（文件最后一个块的 FAT 值）
pub const FAT_EOC: u32 = 0xFFFF_FFFF;

/// FAT 本身的结束标记：空闲链表耗尽时的哨兵，
/// 同时复用为根目录的“无父目录”标记
pub const FAT_EOF: u32 = 0xFFFF_FFFE;

/// 名字的最大长度（字节），超出部分截断
pub const MAX_NAME_LEN: usize = 32;

/// 每个目录最多容纳的子项数（固定数组，也是卷的扇出上限）
pub const MAX_DIR_ENTRIES: usize = 32;

/// 根目录的名字
pub const ROOT_NAME: &str = "/";

/// cd 命令中表示“回到上一级”的记号
pub const PARENT_MARKER: &str = "..";

/// shell 允许的磁盘容量（MB）
pub const SUPPORTED_DISK_SIZES_MB: [u64; 3] = [16, 32, 64];
