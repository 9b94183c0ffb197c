use std::path::PathBuf;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Invalid settings; fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(#[from] rmserial_transport::ConfigError),

    /// A configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON for [`crate::BridgeConfig`].
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rmserial_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rmserial_frame::FrameError),

    /// The link is reconnecting or closed; the frame was not written.
    #[error("link not open ({0:?})")]
    NotOpen(crate::state::LinkStatus),

    /// The bridge was told to stop.
    #[error("link stopped")]
    Stopped,

    /// The receive thread could not be started.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors reported by a remote color negotiation channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// The remote parameter service is not reachable yet.
    #[error("remote parameter server is not ready")]
    NotReady,

    /// The remote side refused the new value.
    #[error("remote rejected the parameter: {0}")]
    Rejected(String),

    /// The channel went away before answering.
    #[error("negotiation channel closed")]
    ChannelClosed,
}
