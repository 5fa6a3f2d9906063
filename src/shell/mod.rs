pub mod command;
pub mod parse;

use crate::shell::{
    command::{execute_command, Command, ShellState},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{DefaultCompleter, DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use std::{io::stdout, path::PathBuf, thread, time::Duration};

pub fn start_shell() {
    boot_animation();

    let username = whoami::username();
    let hostname = whoami::hostname();
    let mut state = ShellState::new();

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fatshell_history");

    let mut line_editor = Reedline::create().with_history(Box::new(
        reedline::FileBackedHistory::with_file(100, history_path).unwrap(),
    ));

    // 命令补全
    let commands: Vec<String> = vec![
        "help", "ls", "pwd", "info", "mkdir", "rmdir", "touch", "rm", "cd", "cat", "append",
        "format", "close", "exit",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!(
                "{}:{}",
                format!("{}@{}", username, hostname).green(),
                state.current_path().blue()
            )),
            DefaultPromptSegment::Basic("FatShell".bright_blue().bold().to_string()),
        );

        let input = line_editor.read_line(&prompt);

        match input {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut state) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            println!("{}", "👋 Bye!".bright_yellow());
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or missing arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                if let Err(e) = execute_command(&Command::Exit, &mut state) {
                    println!("{} {}", "❌ Error:".red().bold(), e);
                }
                break;
            }
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    println!("{}", "GoodBye!".bright_yellow());
}

///动态欢迎动画
fn boot_animation() {
    let mut stdout = stdout();

    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0)).unwrap();
    println!("{}", "[FatShell Booting...]".bright_yellow().bold());
    thread::sleep(Duration::from_millis(200));

    let steps = vec!["🧠 Preparing block device layer...", "📁 Loading shell..."];

    for step in steps {
        println!("{}", step);
        thread::sleep(Duration::from_millis(250));
    }

    // 模拟进度条
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    for i in 0..100 {
        pb.set_position(i);
        thread::sleep(Duration::from_millis(5));
    }
    pb.finish_with_message("✅ Ready!");

    thread::sleep(Duration::from_millis(200));
    execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print("Welcome to FatShell v0.1.0\n"),
        ResetColor
    )
    .unwrap();
}
