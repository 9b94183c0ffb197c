use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {device}: {source}")]
    Open {
        device: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply line settings to an opened device.
    #[error("failed to configure {device}: {source}")]
    Configure {
        device: PathBuf,
        source: std::io::Error,
    },

    /// The requested line setting is not supported by the platform.
    #[error("unsupported setting: {0}")]
    Unsupported(String),

    /// An I/O error occurred on the open device.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is not open.
    #[error("transport not open")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while parsing or validating transport settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A setting holds a value outside its allowed set.
    #[error("the {field} parameter must be one of: {expected} (got {value:?})")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A required setting is empty.
    #[error("the {0} parameter must not be empty")]
    Empty(&'static str),

    /// A numeric setting is zero where a positive value is required.
    #[error("the {0} parameter must be greater than zero")]
    Zero(&'static str),
}
