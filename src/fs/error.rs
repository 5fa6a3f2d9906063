use std::fmt;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),        // 底层 I/O 错误
    DiskFull,                  // 没有空闲块了
    NotMounted,                // 还没有 format/挂载磁盘
    UnsupportedDiskSize(u64),  // format 参数不在允许的容量里
    NotFound(String),          // 文件或目录不存在，带名字
    AlreadyExists(String),     // 同名同类型的子项已存在
    DirectoryNotEmpty(String), // 目录非空
    DirectoryFull(String),     // 目录的子项数组已满
    AlreadyAtRoot,             // 已经在根目录，无法再向上
    InvalidBlock(u32),         // 块号越界
    EntryTooLarge(usize),      // 序列化后的记录超过一个块
    Corrupted(String),         // 块内容无法解码
                               // 可以继续扩展其他错误类型
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::DiskFull => write!(f, "No free blocks available"),
            Self::NotMounted => write!(f, "No disk mounted, format a disk first"),
            Self::UnsupportedDiskSize(mb) => {
                write!(f, "Unsupported disk size: {} MB (use 16, 32 or 64)", mb)
            }
            Self::NotFound(name) => write!(f, "File or directory not found: {}", name),
            Self::AlreadyExists(name) => write!(f, "File or directory already exists: {}", name),
            Self::DirectoryNotEmpty(name) => write!(f, "Directory is not empty: {}", name),
            Self::DirectoryFull(name) => write!(f, "Directory has no free slot: {}", name),
            Self::AlreadyAtRoot => write!(f, "Already at root directory"),
            Self::InvalidBlock(block) => write!(f, "Invalid block index: {}", block),
            Self::EntryTooLarge(len) => {
                write!(f, "Entry record of {} bytes does not fit in one block", len)
            }
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
