//! Fixed-layout packet framing for the rmserial link.
//!
//! Controller-to-host frames are synchronized on a single sentinel byte
//! (`0x5A`) and carry a trailing little-endian CRC-16 over every preceding
//! byte. Host-to-controller frames carry the same trailing CRC.
//!
//! Every frame read is either a validated packet or a typed error saying why
//! it was dropped.

pub mod crc;
pub mod error;
pub mod packet;
pub mod reader;
pub mod writer;

pub use error::{FrameError, Result};
pub use packet::{ReceivePacket, RobotColor, SendPacket, CRC_SIZE, SENTINEL};
pub use reader::FrameReader;
pub use writer::FrameWriter;
