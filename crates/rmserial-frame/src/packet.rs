use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crc;
use crate::error::{FrameError, Result};

/// Header byte of every controller-to-host frame.
pub const SENTINEL: u8 = 0x5A;

/// Size of the trailing checksum.
pub const CRC_SIZE: usize = 2;

/// Robot side as reported by the controller (wire value 0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotColor {
    Red = 0,
    Blue = 1,
}

impl RobotColor {
    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            RobotColor::Red => RobotColor::Blue,
            RobotColor::Blue => RobotColor::Red,
        }
    }

    /// Wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RobotColor {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(RobotColor::Red),
            1 => Ok(RobotColor::Blue),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for RobotColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RobotColor::Red => "red",
            RobotColor::Blue => "blue",
        })
    }
}

/// Controller-to-host state frame.
///
/// Wire format (12 bytes, all multi-byte fields little-endian):
/// ```text
/// ┌────────┬───────┬────────────┬────────────┬──────────┐
/// │ Header │ Color │ Pitch      │ Yaw        │ CRC-16   │
/// │ 0x5A   │ (1B)  │ (f32, rad) │ (f32, rad) │ (2B LE)  │
/// └────────┴───────┴────────────┴────────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivePacket {
    pub header: u8,
    pub robot_color: u8,
    pub pitch: f32,
    pub yaw: f32,
    pub checksum: u16,
}

impl ReceivePacket {
    /// Total wire size.
    pub const SIZE: usize = 12;

    /// Unsealed packet with the sentinel header.
    pub fn new(robot_color: u8, pitch: f32, yaw: f32) -> Self {
        Self {
            header: SENTINEL,
            robot_color,
            pitch,
            yaw,
            checksum: 0,
        }
    }

    /// Decoded robot color, if the wire value is a known side.
    pub fn color(&self) -> Option<RobotColor> {
        RobotColor::try_from(self.robot_color).ok()
    }

    /// Append the wire form, checksum as currently stored.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::SIZE);
        dst.put_u8(self.header);
        dst.put_u8(self.robot_color);
        dst.put_f32_le(self.pitch);
        dst.put_f32_le(self.yaw);
        dst.put_u16_le(self.checksum);
    }

    /// The wire form as a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Reinterpret exactly [`Self::SIZE`] bytes. Content is not validated.
    pub fn decode(mut src: &[u8]) -> Result<Self> {
        check_size(Self::SIZE, src.len())?;
        Ok(Self {
            header: src.get_u8(),
            robot_color: src.get_u8(),
            pitch: src.get_f32_le(),
            yaw: src.get_f32_le(),
            checksum: src.get_u16_le(),
        })
    }

    /// Compute and store the checksum over every other field.
    pub fn seal(&mut self) {
        self.checksum = crc::compute(&self.to_bytes()[..Self::SIZE - CRC_SIZE]);
    }

    /// Sealed copy of this packet.
    pub fn sealed(mut self) -> Self {
        self.seal();
        self
    }
}

/// Host-to-controller aiming command frame.
///
/// Wire format (29 bytes, all multi-byte fields little-endian):
/// ```text
/// ┌───────┬───────┬──────┬──────────────┬─────────────────┬─────────┐
/// │ Found │ Color │ Mode │ x, y, z      │ vx, vy, vz      │ CRC-16  │
/// │ (1B)  │ (1B)  │ (1B) │ (3 × f32)    │ (3 × f32)       │ (2B LE) │
/// └───────┴───────┴──────┴──────────────┴─────────────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SendPacket {
    pub target_found: bool,
    pub target_color: bool,
    pub task_mode: u8,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub checksum: u16,
}

impl SendPacket {
    /// Total wire size.
    pub const SIZE: usize = 29;

    /// Append the wire form, checksum as currently stored.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::SIZE);
        dst.put_u8(u8::from(self.target_found));
        dst.put_u8(u8::from(self.target_color));
        dst.put_u8(self.task_mode);
        for value in [self.x, self.y, self.z, self.vx, self.vy, self.vz] {
            dst.put_f32_le(value);
        }
        dst.put_u16_le(self.checksum);
    }

    /// The wire form as a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Reinterpret exactly [`Self::SIZE`] bytes. Any nonzero flag byte is true.
    pub fn decode(mut src: &[u8]) -> Result<Self> {
        check_size(Self::SIZE, src.len())?;
        Ok(Self {
            target_found: src.get_u8() != 0,
            target_color: src.get_u8() != 0,
            task_mode: src.get_u8(),
            x: src.get_f32_le(),
            y: src.get_f32_le(),
            z: src.get_f32_le(),
            vx: src.get_f32_le(),
            vy: src.get_f32_le(),
            vz: src.get_f32_le(),
            checksum: src.get_u16_le(),
        })
    }

    /// Compute and store the checksum over every other field.
    pub fn seal(&mut self) {
        self.checksum = crc::compute(&self.to_bytes()[..Self::SIZE - CRC_SIZE]);
    }

    /// Sealed copy of this packet.
    pub fn sealed(mut self) -> Self {
        self.seal();
        self
    }
}

fn check_size(expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(FrameError::MalformedFrame { expected, actual });
    }
    Ok(())
}
