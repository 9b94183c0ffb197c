use rmserial_transport::SerialTransport;

use crate::crc;
use crate::error::{FrameError, Result};
use crate::packet::{ReceivePacket, CRC_SIZE, SENTINEL};

/// Reads sentinel-framed [`ReceivePacket`]s from a transport.
///
/// Each call to [`read_packet`](Self::read_packet) runs one receive cycle:
/// read one header byte, read the rest of the fixed-size frame, verify the
/// checksum, decode. Nothing is buffered between cycles, so a dropped frame
/// never leaves bytes behind for the next one. A non-sentinel header byte is
/// consumed on its own; a stream that lost sync realigns one byte per call.
pub struct FrameReader<T> {
    inner: T,
    frame: [u8; ReceivePacket::SIZE],
}

impl<T: SerialTransport> FrameReader<T> {
    /// Create a frame reader over `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            frame: [0u8; ReceivePacket::SIZE],
        }
    }

    /// Run one receive cycle (blocking).
    ///
    /// Returns [`FrameError::InvalidHeader`] after consuming a single
    /// non-sentinel byte and [`FrameError::CrcMismatch`] after consuming a
    /// whole frame whose checksum does not match. Transport failures are
    /// returned as [`FrameError::Transport`].
    pub fn read_packet(&mut self) -> Result<ReceivePacket> {
        self.inner.receive(&mut self.frame[..1])?;
        if self.frame[0] != SENTINEL {
            return Err(FrameError::InvalidHeader(self.frame[0]));
        }

        self.inner.receive(&mut self.frame[1..])?;

        if !crc::verify(&self.frame) {
            let body = ReceivePacket::SIZE - CRC_SIZE;
            return Err(FrameError::CrcMismatch {
                computed: crc::compute(&self.frame[..body]),
                received: crc::trailing(&self.frame).unwrap_or_default(),
            });
        }

        ReceivePacket::decode(&self.frame)
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
