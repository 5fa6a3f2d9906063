use colored::*;

use crate::{
    fs::{
        config::SUPPORTED_DISK_SIZES_MB,
        error::{FileSystemError, Result},
        fat::format_fat_entries,
        FileSystem,
    },
    utils::format_size,
};

#[derive(Debug)]
pub enum Command {
    Help,
    Ls,
    Pwd,
    Info,
    Mkdir(String),
    Rmdir(String),
    Touch(String),
    Rm(String),
    Cd(String),
    Cat(String),
    Append(String, String),
    Format(String, u64),
    Close,
    Exit,
}

/// shell 持有的全部状态：挂载的文件系统和当前目录的游标。
/// 游标只是一个块号，不落盘。
pub struct ShellState {
    pub fs: Option<FileSystem>,
    pub cursor: u32,
}

impl ShellState {
    pub fn new() -> Self {
        Self { fs: None, cursor: 0 }
    }

    pub fn current_path(&self) -> String {
        match &self.fs {
            Some(fs) => fs
                .current_path(self.cursor)
                .unwrap_or_else(|_| "?".to_string()),
            None => "(no disk)".to_string(),
        }
    }

    fn mounted(&mut self) -> Result<&mut FileSystem> {
        self.fs.as_mut().ok_or(FileSystemError::NotMounted)
    }
}

pub fn execute_command(cmd: &Command, state: &mut ShellState) -> Result<()> {
    match cmd {
        Command::Help => print_help(),
        Command::Format(name, mb) => {
            if !SUPPORTED_DISK_SIZES_MB.contains(mb) {
                return Err(FileSystemError::UnsupportedDiskSize(*mb));
            }
            if state.fs.is_some() {
                println!("{}", "⚠️  A disk is already mounted, close it first.".yellow());
                return Ok(());
            }
            println!("💾 Formatting {} ({} MB)...", name.cyan(), mb);
            let fs = FileSystem::format(name, mb * 1024 * 1024)?;
            state.cursor = fs.root_block();
            state.fs = Some(fs);
            println!("{}", "✅ Disk mounted, current directory set to root.".green());
        }
        Command::Ls => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            let entries = fs.list_directory(cursor)?;
            if entries.is_empty() {
                println!("{}", "Directory is empty.".bright_black());
            }
            for entry in entries {
                if entry.is_directory() {
                    println!(
                        "📁 {}  {}",
                        entry.name().blue().bold(),
                        format!("{} entries", entry.size).bright_black()
                    );
                } else {
                    println!(
                        "📄 {}  {}",
                        entry.name(),
                        format_size(entry.size as u64).bright_black()
                    );
                }
            }
        }
        Command::Pwd => println!("📍 {}", state.current_path().cyan()),
        Command::Info => {
            let fs = state.mounted()?;
            let sb = fs.volume_info()?;
            println!("{}", "📊 Volume Info".bright_yellow().bold());
            println!("{}: {}", "Name".blue(), sb.name());
            println!("{}: {}", "Volume ID".blue(), sb.volume_id());
            println!("{}: {}", "Disk Size".blue(), format_size(sb.disk_size));
            println!("{}: {}", "Block Size".blue(), format_size(sb.block_size));
            println!("{}: {}", "Free Blocks".blue(), sb.free_blocks);
            println!("{}: {}", "Free List Head".blue(), sb.free_list_head);
            let fat = fs.fat_snapshot()?;
            println!("{}", "FAT (first 10 entries):".bright_black());
            print!("{}", format_fat_entries(&fat, 10).bright_black());
        }
        Command::Mkdir(name) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            fs.create_directory(name, cursor)?;
            println!("✅ Created directory: {}", name.green());
        }
        Command::Rmdir(name) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            fs.remove_directory(name, cursor)?;
            println!("🗑️  Removed directory: {}", name.red());
        }
        Command::Touch(name) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            fs.create_file(name, cursor)?;
            println!("📝 Created file: {}", name.green());
        }
        Command::Rm(name) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            fs.remove_file(name, cursor)?;
            println!("❌ Deleted file: {}", name.red());
        }
        Command::Cd(name) => {
            let cursor = state.cursor;
            let new_cursor = state.mounted()?.change_directory(name, cursor)?;
            state.cursor = new_cursor;
            println!("📂 Moved to {}", state.current_path().blue());
        }
        Command::Cat(name) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            let bytes = fs.read_file(name, cursor)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }
        Command::Append(name, text) => {
            let cursor = state.cursor;
            let fs = state.mounted()?;
            fs.append_to_file(name, cursor, text.as_bytes())?;
            println!(
                "✏️  Appended {} to {}",
                format_size(text.len() as u64).green(),
                name.cyan()
            );
        }
        Command::Close => {
            match state.fs.take() {
                Some(fs) => {
                    fs.close()?;
                    state.cursor = 0;
                    println!("{}", "💤 Disk unmounted.".yellow());
                }
                None => println!("{}", "No disk mounted.".bright_black()),
            }
        }
        Command::Exit => {
            // 退出前把已挂载的磁盘刷干净
            if let Some(fs) = state.fs.take() {
                fs.close()?;
            }
            println!("{}", "👋 Exiting shell...".yellow().bold());
        }
    }

    Ok(())
}

fn print_help() {
    println!("{}", "📘 FatShell Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format <name> <16|32|64>  Create/open a disk image of the given size in MB
  ls                        List entries in current directory
  pwd                       Print current path
  mkdir <dir>               Create directory
  rmdir <dir>               Remove empty directory
  touch <file>              Create empty file
  rm <file>                 Remove file
  cd <dir|..>               Change directory
  cat <file>                Print file content
  append <file> <text>      Append text to file
  info                      Show volume info and FAT head
  close                     Unmount the disk image
  help                      Show this help message
  exit                      Quit the shell
"
        .bright_black()
    );
}
