//! Door commands and their wire frames.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A command understood by the door actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DoorCommand {
    StartDoor,
    CloseDoor,
}

impl DoorCommand {
    /// The bare token, without terminator.
    pub fn token(&self) -> &'static str {
        match self {
            DoorCommand::StartDoor => "START_DOOR",
            DoorCommand::CloseDoor => "CLOSE_DOOR",
        }
    }

    /// UTF-8 token followed by exactly one `\n`.
    pub fn frame(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.token().len() + 1);
        out.extend_from_slice(self.token().as_bytes());
        out.push(b'\n');
        out
    }
}

impl fmt::Display for DoorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown door command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for DoorCommand {
    type Err = UnknownCommand;

    /// Accepts the wire token in any case, plus the short aliases
    /// `start`/`open` and `close`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START_DOOR" | "START" | "OPEN" => Ok(DoorCommand::StartDoor),
            "CLOSE_DOOR" | "CLOSE"          => Ok(DoorCommand::CloseDoor),
            _ => Err(UnknownCommand(s.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_newline_terminated_tokens() {
        assert_eq!(DoorCommand::StartDoor.frame(), b"START_DOOR\n".to_vec());
        assert_eq!(DoorCommand::CloseDoor.frame(), b"CLOSE_DOOR\n".to_vec());
    }

    #[test]
    fn parse_accepts_tokens_and_aliases() {
        assert_eq!("start_door".parse(), Ok(DoorCommand::StartDoor));
        assert_eq!("  open ".parse(), Ok(DoorCommand::StartDoor));
        assert_eq!("CLOSE".parse(), Ok(DoorCommand::CloseDoor));
        assert_eq!(
            "jump".parse::<DoorCommand>(),
            Err(UnknownCommand("jump".to_string()))
        );
    }
}
