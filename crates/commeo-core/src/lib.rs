//! Commeo Core
//!
//! Frame codec and domain types for the Selve Commeo gateway protocol.
//!
//! This crate provides:
//! - XML-RPC style frame decoding/encoding ([`Frame`], [`codec`])
//! - The closed table of gateway method names ([`Method`])
//! - Read-only views over decoded frames ([`DeviceIdentity`], [`StatusSnapshot`])
//! - Outbound shutter commands ([`Command`])
//! - Decoders for gateway event frames ([`CommandOutcome`], [`DutyCycle`], [`LogEvent`])

pub mod actor;
pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod frame;
pub mod method;
pub mod status;

pub use actor::DeviceIdentity;
pub use codec::{decode, decode_int_set, encode_call, encode_int_set};
pub use command::{Command, CommandKind};
pub use error::{Error, Result};
pub use event::{CommandOutcome, DutyCycle, LogEvent, LogSeverity};
pub use frame::{Envelope, Field, FieldKind, Frame};
pub use method::Method;
pub use status::{MotionState, StatusSnapshot};

/// Numeric actor identifier assigned by the gateway
pub type ActorId = u32;

/// Raw position reported for a fully closed shutter (0 is fully open)
pub const MAX_RAW_POSITION: u16 = 65535;

/// Default serial baud rate of the gateway
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Every frame on the wire ends with this terminator
pub const FRAME_TERMINATOR: &[u8] = b"\n\n";
