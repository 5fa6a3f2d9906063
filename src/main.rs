use crate::shell::start_shell;

mod disk;
mod fs;
mod shell;
mod utils;

fn main() {
    start_shell();
}
