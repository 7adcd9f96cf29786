use std::str::FromStr;

use thiserror::Error;

pub const COMMAND_HELP: &str =
    "Use 'n' to start a new session, 's' to stop the current session, or 'q' to quit.";

/// Commands accepted on standard input while tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NewSession,
    StopSession,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid command. Use 'n' for new session, 's' to stop session, or 'q' to quit.")]
pub struct InvalidCommand(pub String);

impl FromStr for Command {
    type Err = InvalidCommand;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim().to_lowercase().as_str() {
            "n" => Ok(Command::NewSession),
            "s" => Ok(Command::StopSession),
            "q" => Ok(Command::Quit),
            _ => Err(InvalidCommand(line.to_string())),
        }
    }
}
