//! Gateway event frames that only inform, never change actor tables

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::{ActorId, CommandKind, Frame, Result};

/// Outcome of a drive command, from `selve.GW.command.result`.
///
/// Wire order: command code, command type, executed flag, succeeded
/// bitmask, failed bitmask. Ints and bitmasks are indexed separately, so
/// that is `int(0)` command code, `int(1)` command type, `int(2)` executed
/// flag (0 = the gateway reports an error), `base64(0)` succeeded actors and
/// `base64(1)` failed actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command_code: i64,
    /// 0 forced, 1 manual, 2 time, 3 glass
    pub command_type: i64,
    pub succeeded: BTreeSet<ActorId>,
    pub failed: BTreeSet<ActorId>,
    pub executed: bool,
}

impl CommandOutcome {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            command_code: frame.int(0)?,
            command_type: frame.int(1)?,
            succeeded: frame.int_set(0)?,
            failed: frame.int_set(1)?,
            executed: frame.int(2)? != 0,
        })
    }

    pub fn command(&self) -> Option<CommandKind> {
        CommandKind::from_code(self.command_code)
    }

    /// True when the gateway flagged an error or any actor failed
    pub fn has_error(&self) -> bool {
        !self.executed || !self.failed.is_empty()
    }

    /// Log level for this outcome: errors for total failure, warnings for
    /// partial failure or an error flag, info for a clean completion
    pub fn level(&self) -> Level {
        if !self.failed.is_empty() && self.succeeded.is_empty() {
            Level::ERROR
        } else if self.has_error() {
            Level::WARN
        } else {
            Level::INFO
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Some(kind) => write!(f, "{}", kind)?,
            None => write!(f, "COMMAND({})", self.command_code)?,
        }
        if self.failed.is_empty() {
            if self.executed {
                write!(f, " completed: actors {:?}", self.succeeded)
            } else {
                write!(f, " completed with errors: actors {:?}", self.succeeded)
            }
        } else if self.succeeded.is_empty() {
            write!(f, " FAILED: actors {:?}", self.failed)
        } else {
            write!(
                f,
                ": failed actors {:?}, succeeded actors {:?}",
                self.failed, self.succeeded
            )
        }
    }
}

/// Radio duty-cycle report, from `selve.GW.event.dutyCycle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCycle {
    /// Gateway refuses to transmit until the budget resets
    pub blocked: bool,
    /// Remaining radio usage allowance reported by the gateway
    pub allowed_usage: i64,
}

impl DutyCycle {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            blocked: frame.int(0)? == 1,
            allowed_usage: frame.int(1)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

impl LogSeverity {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LogSeverity::Info,
            1 => LogSeverity::Warning,
            _ => LogSeverity::Error,
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogSeverity::Info => "Info",
            LogSeverity::Warning => "Warning",
            LogSeverity::Error => "Error",
        })
    }
}

/// Gateway log message, from `selve.GW.event.log`.
///
/// Field layout: `int(0)` severity, `string(0)` code, `string(1)` timestamp,
/// `string(2)` message, `string(3)` description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub severity: LogSeverity,
    pub code: String,
    pub stamp: String,
    pub message: String,
    pub description: String,
}

impl LogEvent {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            severity: LogSeverity::from_code(frame.int(0)?),
            code: frame.string(0)?.to_string(),
            stamp: frame.string(1)?.to_string(),
            message: frame.string(2)?.to_string(),
            description: frame.string(3)?.to_string(),
        })
    }
}
