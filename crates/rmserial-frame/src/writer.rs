use bytes::BytesMut;
use rmserial_transport::SerialTransport;

use crate::error::Result;
use crate::packet::SendPacket;

/// Writes [`SendPacket`]s to a transport.
///
/// Every packet is sealed immediately before encoding; whatever checksum the
/// caller left in the packet is replaced.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: SerialTransport> FrameWriter<T> {
    /// Create a frame writer over `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(SendPacket::SIZE),
        }
    }

    /// Seal, encode and send one packet (blocking).
    ///
    /// Returns the packet as it went on the wire.
    pub fn write_packet(&mut self, packet: &SendPacket) -> Result<SendPacket> {
        let sealed = packet.sealed();
        self.buf.clear();
        sealed.encode(&mut self.buf);
        self.inner.send(&self.buf)?;
        Ok(sealed)
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use rmserial_transport::{MemoryTransport, TransportError};

    use super::*;
    use crate::crc;
    use crate::error::FrameError;

    fn open_transport() -> MemoryTransport {
        let transport = MemoryTransport::new();
        transport.open().unwrap();
        transport
    }

    #[test]
    fn written_frame_carries_valid_crc() {
        let transport = open_transport();
        let mut writer = FrameWriter::new(&transport);

        let packet = SendPacket {
            target_found: true,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            ..SendPacket::default()
        };
        let sent = writer.write_packet(&packet).unwrap();

        let wire = transport.take_outbound();
        assert_eq!(wire.len(), SendPacket::SIZE);
        assert!(crc::verify(&wire));
        assert_eq!(SendPacket::decode(&wire).unwrap(), sent);
    }

    #[test]
    fn stale_checksum_is_replaced() {
        let transport = open_transport();
        let mut writer = FrameWriter::new(&transport);

        let packet = SendPacket {
            vz: -4.5,
            checksum: 0xDEAD,
            ..SendPacket::default()
        };
        let sent = writer.write_packet(&packet).unwrap();

        assert_ne!(sent.checksum, 0xDEAD);
        assert!(crc::verify(&transport.take_outbound()));
    }

    #[test]
    fn consecutive_frames_are_independent() {
        let transport = open_transport();
        let mut writer = FrameWriter::new(&transport);

        for i in 0..4 {
            let packet = SendPacket {
                target_found: i % 2 == 0,
                x: i as f32,
                ..SendPacket::default()
            };
            writer.write_packet(&packet).unwrap();
        }

        let wire = transport.take_outbound();
        assert_eq!(wire.len(), 4 * SendPacket::SIZE);
        for (i, chunk) in wire.chunks(SendPacket::SIZE).enumerate() {
            assert!(crc::verify(chunk));
            assert_eq!(SendPacket::decode(chunk).unwrap().x, i as f32);
        }
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = open_transport();
        transport.fail_next_sends(1);
        let mut writer = FrameWriter::new(&transport);

        let err = writer.write_packet(&SendPacket::default()).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Io(_))));
        assert!(transport.take_outbound().is_empty());
    }

    #[test]
    fn closed_transport_is_not_open() {
        let transport = MemoryTransport::new();
        let mut writer = FrameWriter::new(&transport);
        assert!(matches!(
            writer.write_packet(&SendPacket::default()),
            Err(FrameError::Transport(TransportError::NotOpen))
        ));
        assert_eq!(writer.get_ref().name(), "memory");
        let _inner = writer.into_inner();
    }
}
