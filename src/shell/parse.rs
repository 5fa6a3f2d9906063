use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "pwd" => Some(Command::Pwd),
        "info" => Some(Command::Info),
        "mkdir" => args.first().map(|&name| Command::Mkdir(name.to_string())),
        "rmdir" => args.first().map(|&name| Command::Rmdir(name.to_string())),
        "touch" => args.first().map(|&name| Command::Touch(name.to_string())),
        "rm" => args.first().map(|&name| Command::Rm(name.to_string())),
        "cd" => args.first().map(|&name| Command::Cd(name.to_string())),
        "cat" => args.first().map(|&name| Command::Cat(name.to_string())),
        "append" => {
            if args.len() >= 2 {
                Some(Command::Append(
                    args.first()?.to_string(),
                    args[1..].join(" "),
                ))
            } else {
                None
            }
        }
        "format" => {
            // format <name> <16|32|64>
            if args.len() >= 2 {
                let mb = args[1].parse::<u64>().ok()?;
                Some(Command::Format(args[0].to_string(), mb))
            } else {
                None
            }
        }
        "close" => Some(Command::Close),
        "exit" => Some(Command::Exit),
        _ => None,
    }
}
