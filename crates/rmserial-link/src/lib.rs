//! Supervised controller link.
//!
//! This is the "keep it running" layer. A [`Bridge`] owns one transport,
//! runs the receive loop on a dedicated thread, encodes outgoing commands on
//! the caller's thread, and hands every transport failure to the
//! [`LinkSupervisor`], which reopens the device with a fixed backoff until it
//! succeeds or the bridge is stopped.

pub mod bridge;
pub mod color;
pub mod config;
pub mod error;
pub mod sink;
pub mod state;
pub mod supervisor;

pub use bridge::{Bridge, Collaborators, COLOR_RETRY_INTERVAL, RECEIVE_THREAD_NAME};
pub use color::{ColorNegotiator, Completion, SharedParameter};
pub use config::{BridgeConfig, DEFAULT_RECONNECT_BACKOFF_MS};
pub use error::{LinkError, NegotiationError, Result};
pub use sink::{JointState, LatencySink, StateSink, TargetCommand, Vec3, JOINT_NAMES};
pub use state::{LinkState, LinkStats, LinkStatus};
pub use supervisor::LinkSupervisor;
