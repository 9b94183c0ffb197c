//! CRC-16 used by the controller link.
//!
//! Reflected polynomial 0x1021 (table polynomial 0x8408), initial value
//! 0xFFFF, no final xor. This is the RoboMaster referee-system CRC16 and is
//! bit-identical to CRC-16/MCRF4XX. The checksum travels little-endian in the
//! last two bytes of a frame.

use bytes::{BufMut, Bytes, BytesMut};

use crate::packet::CRC_SIZE;

/// Initial register value.
pub const INIT: u16 = 0xFFFF;

const POLY_REFLECTED: u16 = 0x8408;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Continue a checksum over more bytes.
pub fn update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[usize::from((crc ^ u16::from(byte)) as u8)];
    }
    crc
}

/// Checksum of `data`.
pub fn compute(data: &[u8]) -> u16 {
    update(INIT, data)
}

/// The checksum stored in the last two bytes of `frame`, if it has them.
pub fn trailing(frame: &[u8]) -> Option<u16> {
    let split = frame.len().checked_sub(CRC_SIZE)?;
    Some(u16::from_le_bytes([frame[split], frame[split + 1]]))
}

/// Whether the trailing checksum of `frame` matches its body.
///
/// Frames of [`CRC_SIZE`] bytes or fewer carry no body and never verify.
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() <= CRC_SIZE {
        return false;
    }
    let body = &frame[..frame.len() - CRC_SIZE];
    trailing(frame) == Some(compute(body))
}

/// `data` followed by its checksum.
pub fn append(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len() + CRC_SIZE);
    out.put_slice(data);
    out.put_u16_le(compute(data));
    out.freeze()
}
