//! Outbound drive commands

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::encode_call;
use crate::{ActorId, Error, Method, Result, MAX_RAW_POSITION};

/// Fixed third argument of `selve.GW.command.device` (forced, non-automatic)
const COMMAND_TYPE_MANUAL: i64 = 1;

/// Drive command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandKind {
    Stop = 0,
    DriveUp = 1,
    DriveDown = 2,
    DrivePosition = 7,
}

impl CommandKind {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CommandKind::Stop),
            1 => Some(CommandKind::DriveUp),
            2 => Some(CommandKind::DriveDown),
            7 => Some(CommandKind::DrivePosition),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        *self as i64
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Stop => "STOP",
            CommandKind::DriveUp => "DRIVE_UP",
            CommandKind::DriveDown => "DRIVE_DOWN",
            CommandKind::DrivePosition => "DRIVE_POS",
        };
        f.write_str(name)
    }
}

/// A drive command for one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub actor_id: ActorId,
    pub kind: CommandKind,
    /// Raw target position for [`CommandKind::DrivePosition`], 0 otherwise
    pub parameter: u16,
}

impl Command {
    pub fn stop(actor_id: ActorId) -> Self {
        Self::simple(actor_id, CommandKind::Stop)
    }

    pub fn drive_up(actor_id: ActorId) -> Self {
        Self::simple(actor_id, CommandKind::DriveUp)
    }

    pub fn drive_down(actor_id: ActorId) -> Self {
        Self::simple(actor_id, CommandKind::DriveDown)
    }

    /// Drive to `percent` (0 = open, 100 = closed)
    pub fn drive_to_position(actor_id: ActorId, percent: u8) -> Result<Self> {
        Ok(Self {
            actor_id,
            kind: CommandKind::DrivePosition,
            parameter: percent_to_raw(percent)?,
        })
    }

    fn simple(actor_id: ActorId, kind: CommandKind) -> Self {
        Self {
            actor_id,
            kind,
            parameter: 0,
        }
    }

    /// Wire text of this command (without the frame terminator)
    pub fn encode(&self) -> String {
        encode_call(
            Method::COMMAND_DEVICE,
            &[
                self.actor_id as i64,
                self.kind.code(),
                COMMAND_TYPE_MANUAL,
                self.parameter as i64,
            ],
        )
    }
}

/// Convert a percentage to the raw scale: `ceil(percent * 65535 / 100)`
pub fn percent_to_raw(percent: u8) -> Result<u16> {
    if percent > 100 {
        return Err(Error::InvalidPosition(percent));
    }
    let scaled = (percent as u32 * MAX_RAW_POSITION as u32 + 99) / 100;
    Ok(scaled as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_raw() {
        assert_eq!(percent_to_raw(0).unwrap(), 0);
        assert_eq!(percent_to_raw(50).unwrap(), 32768);
        assert_eq!(percent_to_raw(100).unwrap(), 65535);
        assert_eq!(percent_to_raw(1).unwrap(), 656);
        assert_eq!(percent_to_raw(101), Err(Error::InvalidPosition(101)));
    }

    #[test]
    fn test_drive_to_position_encoding() {
        let cmd = Command::drive_to_position(5, 50).unwrap();
        assert_eq!(
            cmd.encode(),
            "<methodCall><methodName>selve.GW.command.device</methodName><array>\
             <int>5</int><int>7</int><int>1</int><int>32768</int></array></methodCall>"
        );
    }

    #[test]
    fn test_simple_commands_have_zero_parameter() {
        for (cmd, code) in [
            (Command::stop(3), 0),
            (Command::drive_up(3), 1),
            (Command::drive_down(3), 2),
        ] {
            assert_eq!(cmd.parameter, 0);
            assert_eq!(cmd.kind.code(), code);
            assert!(cmd.encode().contains(&format!("<int>3</int><int>{}</int>", code)));
        }
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(CommandKind::from_code(7), Some(CommandKind::DrivePosition));
        assert_eq!(CommandKind::from_code(4), None);
        assert_eq!(CommandKind::DrivePosition.to_string(), "DRIVE_POS");
    }
}
