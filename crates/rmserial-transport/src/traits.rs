use std::sync::Arc;

use crate::error::Result;

/// A blocking, byte-exact serial link.
///
/// All methods take `&self`: implementations synchronize internally so one
/// thread can block in [`receive`](Self::receive) while another calls
/// [`send`](Self::send). Line settings (baud rate, parity, ...) are fixed at
/// construction; the link itself never touches them.
pub trait SerialTransport: Send + Sync {
    /// Open the underlying device. Opening an already open transport succeeds.
    fn open(&self) -> Result<()>;

    /// Close the underlying device. Closing a closed transport succeeds.
    fn close(&self) -> Result<()>;

    /// Whether the transport currently holds an open device.
    fn is_open(&self) -> bool;

    /// Fill `buf` completely, blocking until exactly `buf.len()` bytes arrive.
    fn receive(&self, buf: &mut [u8]) -> Result<()>;

    /// Write all of `buf`, blocking until it has been handed to the device.
    fn send(&self, buf: &[u8]) -> Result<()>;

    /// Transport name for diagnostics.
    fn name(&self) -> &str {
        "serial"
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for &T {
    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn receive(&self, buf: &mut [u8]) -> Result<()> {
        (**self).receive(buf)
    }

    fn send(&self, buf: &[u8]) -> Result<()> {
        (**self).send(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Arc<T> {
    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn receive(&self, buf: &mut [u8]) -> Result<()> {
        (**self).receive(buf)
    }

    fn send(&self, buf: &[u8]) -> Result<()> {
        (**self).send(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn open(&self) -> Result<()> {
        (**self).open()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn receive(&self, buf: &mut [u8]) -> Result<()> {
        (**self).receive(buf)
    }

    fn send(&self, buf: &[u8]) -> Result<()> {
        (**self).send(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
