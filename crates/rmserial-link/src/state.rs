use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rmserial_frame::RobotColor;
use serde::Serialize;

/// Lifecycle of the supervised link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Open,
    Reconnecting,
    Closed,
}

/// Counters kept for the lifetime of a bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub frames_received: u64,
    pub header_errors: u64,
    pub crc_errors: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub reconnects: u64,
}

/// Mutable link state shared by the receive loop and the send path.
#[derive(Debug)]
pub struct LinkState {
    pub status: LinkStatus,
    /// Incremented on every successful open; a failure observed under an
    /// older generation has already been recovered.
    pub generation: u64,
    /// Last robot color confirmed by the remote side, `None` until known.
    pub robot_color: Option<RobotColor>,
    pub color_request_pending: bool,
    /// Set when the remote side was not ready; no new color request before
    /// this instant.
    pub color_retry_after: Option<Instant>,
    pub stats: LinkStats,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            status: LinkStatus::Closed,
            generation: 0,
            robot_color: None,
            color_request_pending: false,
            color_retry_after: None,
            stats: LinkStats::default(),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
