//! Serial transport implementation
//!
//! The Commeo gateway is a USB serial stick running at 115200-8N1. Opening
//! the port yields a [`Connection`] that owns the stream for its lifetime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};
use crate::Connection;

/// Pause after every write, keeps the gateway within its duty cycle
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(80);

/// Upper bound for one framed read
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Serial transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: u8,
    /// Stop bits (default: 1)
    pub stop_bits: u8,
    /// Parity (default: none)
    pub parity: SerialParity,
    /// Flow control (default: none)
    pub flow_control: SerialFlowControl,
    /// Delay after each outbound frame (default: 80 ms)
    #[serde(with = "millis", rename = "send_interval_ms")]
    pub send_interval: Duration,
    /// Timeout of a single receive attempt (default: 3 s)
    #[serde(with = "millis", rename = "receive_timeout_ms")]
    pub receive_timeout: Duration,
}

/// Serial parity options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial flow control options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialFlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: commeo_core::DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: SerialFlowControl::None,
            send_interval: DEFAULT_SEND_INTERVAL,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serial transport for Commeo
#[cfg(feature = "serial")]
pub struct SerialTransport;

#[cfg(feature = "serial")]
impl SerialTransport {
    /// Open a serial port with the default 115200-8N1 settings
    pub async fn open(port_name: &str) -> Result<Connection> {
        Self::open_with_config(port_name, &SerialConfig::default()).await
    }

    /// Open with custom config
    pub async fn open_with_config(port_name: &str, config: &SerialConfig) -> Result<Connection> {
        use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(TransportError::ConnectionFailed(format!(
                    "unsupported data bits: {}",
                    other
                )))
            }
        };
        let stop_bits = match config.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => {
                return Err(TransportError::ConnectionFailed(format!(
                    "unsupported stop bits: {}",
                    other
                )))
            }
        };
        let parity = match config.parity {
            SerialParity::None => Parity::None,
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
        };
        let flow_control = match config.flow_control {
            SerialFlowControl::None => FlowControl::None,
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
        };

        let port = tokio_serial::new(port_name, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .open_native_async()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("failed to open {}: {}", port_name, e))
            })?;

        tracing::info!(
            "Serial port opened: {} @ {} baud",
            port_name,
            config.baud_rate
        );

        Ok(Connection::from_stream(port, config))
    }
}

// Stub implementation when serial feature is disabled
#[cfg(not(feature = "serial"))]
pub struct SerialTransport;

#[cfg(not(feature = "serial"))]
impl SerialTransport {
    pub async fn open(_port_name: &str) -> Result<Connection> {
        Err(TransportError::ConnectionFailed(
            "Serial feature not enabled. Compile with --features serial".into(),
        ))
    }

    pub async fn open_with_config(_port_name: &str, _config: &SerialConfig) -> Result<Connection> {
        Self::open(_port_name).await
    }
}
