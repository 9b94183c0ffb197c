//! Serial transport abstraction.
//!
//! Provides the byte-exact, blocking interface the rmserial link is built on:
//! - [`TtyPort`] for POSIX serial devices (Linux/macOS)
//! - [`MemoryTransport`] for in-process streams (replay, simulation, tests)
//!
//! This is the lowest layer of rmserial. Everything else builds on top of
//! the [`SerialTransport`] trait provided here.

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod tty;

pub use config::{FlowControl, Parity, SerialPortConfig, StopBits};
pub use error::{ConfigError, Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::SerialTransport;

#[cfg(unix)]
pub use tty::TtyPort;
