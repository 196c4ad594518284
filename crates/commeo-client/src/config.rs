//! Gateway configuration
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//!
//! [transport]
//! baud_rate = 115200
//! send_interval_ms = 80
//! receive_timeout_ms = 3000
//! ```

use std::path::Path;

use commeo_transport::SerialConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Serial device used when nothing else is configured
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Where the gateway is attached and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Serial device path (`/dev/ttyUSB0`, `COM3`, ...)
    pub port: String,
    pub transport: SerialConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            transport: SerialConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file. A missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.transport.baud_rate, 115_200);
    }

    #[test]
    fn test_partial_transport_section() {
        let config = GatewayConfig::from_toml_str(
            r#"
            port = "/dev/ttyACM0"

            [transport]
            send_interval_ms = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.transport.send_interval, Duration::from_millis(120));
        assert_eq!(config.transport.receive_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_parity_and_flow_control() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [transport]
            parity = "even"
            flow_control = "hardware"
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.parity, commeo_transport::SerialParity::Even);
        assert_eq!(
            config.transport.flow_control,
            commeo_transport::SerialFlowControl::Hardware
        );
    }

    #[test]
    fn test_invalid_toml() {
        let result = GatewayConfig::from_toml_str("port = ");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = GatewayConfig::load("/nonexistent/commeo.toml");
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
