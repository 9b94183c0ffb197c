use rmserial_transport::TransportError;

use crate::packet::SENTINEL;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The byte in header position is not the sentinel.
    #[error("invalid header: {0:#04X} (expected {sentinel:#04X})", sentinel = SENTINEL)]
    InvalidHeader(u8),

    /// The trailing checksum does not match the frame contents.
    #[error("CRC error (computed {computed:#06X}, received {received:#06X})")]
    CrcMismatch { computed: u16, received: u16 },

    /// The byte count does not match the fixed record size.
    #[error("malformed frame ({actual} bytes, expected {expected})")]
    MalformedFrame { expected: usize, actual: usize },

    /// The transport failed while reading or writing a frame.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Whether the error came from the transport rather than frame contents.
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
