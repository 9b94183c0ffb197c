//! Serial bridge between a vision host and a gimbal controller.
//!
//! rmserial decodes sentinel-framed, CRC-16 protected state frames from the
//! controller, forwards aiming commands back to it, and keeps the link alive
//! across cable pulls and device resets.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-exact serial transport (POSIX tty, in-memory)
//! - [`frame`]: Packet layouts, CRC-16, frame reader and writer
//! - [`link`]: Supervised bridge with reconnect (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use rmserial_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rmserial_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use rmserial_link::*;
}
