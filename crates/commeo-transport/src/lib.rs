//! Commeo Transport Layer
//!
//! Owns the byte stream to the gateway:
//! - Serial port setup (115200-8N1 by default)
//! - Outbound queue with a single writer and a fixed inter-frame delay
//! - Single-flight framed reads with a timeout

pub mod connection;
pub mod error;
pub mod serial;

pub use connection::{Connection, ReceiveOutcome, MAX_FRAME_SIZE, MAX_READ_ERRORS};
pub use error::{Result, TransportError};
pub use serial::{
    SerialConfig, SerialFlowControl, SerialParity, SerialTransport, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_SEND_INTERVAL,
};
