use std::path::Path;
use std::time::Duration;

use rmserial_transport::{ConfigError, SerialPortConfig};
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Default wait between reopen attempts.
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 1_000;

/// Bridge settings, loaded once at startup.
///
/// JSON form:
/// ```json
/// {
///   "device_name": "/dev/ttyACM0",
///   "baud_rate": 115200,
///   "flow_control": "none",
///   "parity": "none",
///   "stop_bits": "1",
///   "reconnect_backoff_ms": 1000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub device_name: String,
    #[serde(flatten)]
    pub port: SerialPortConfig,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

fn default_reconnect_backoff_ms() -> u64 {
    DEFAULT_RECONNECT_BACKOFF_MS
}

impl BridgeConfig {
    pub fn new(device_name: impl Into<String>, port: SerialPortConfig) -> Self {
        Self {
            device_name: device_name.into(),
            port,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
        }
    }

    /// Parse from a JSON document. The result is not validated.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON file. The result is not validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LinkError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Reject settings that can never produce a working link.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Empty("device_name"));
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(ConfigError::Zero("reconnect_backoff_ms"));
        }
        self.port.validate()
    }

    /// Wait between reopen attempts.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
