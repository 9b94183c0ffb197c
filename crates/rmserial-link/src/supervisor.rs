use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rmserial_frame::RobotColor;
use rmserial_transport::SerialTransport;
use tracing::{debug, error, info, warn};

use crate::error::{LinkError, Result};
use crate::state::{lock, LinkState, LinkStats, LinkStatus};

/// Owns the transport lifecycle and recovers it after I/O failures.
///
/// States: `Closed` → `Open` on [`open`](Self::open); `Open` → `Reconnecting`
/// on any failure report; `Reconnecting` → `Open` once the device reopens;
/// any state → `Closed` on [`shutdown`](Self::shutdown), which is terminal.
///
/// Open, close and reconnect are serialized. Callers report failures with
/// the link generation they were using, so when both the receive loop and
/// the send path fail on the same device only one of them reopens it.
pub struct LinkSupervisor<T> {
    transport: T,
    state: Arc<Mutex<LinkState>>,
    lifecycle: Mutex<()>,
    running: Arc<AtomicBool>,
    backoff: Duration,
}

impl<T: SerialTransport> LinkSupervisor<T> {
    /// Create a supervisor for a closed transport.
    pub fn new(transport: T, backoff: Duration) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(LinkState::default())),
            lifecycle: Mutex::new(()),
            running: Arc::new(AtomicBool::new(true)),
            backoff,
        }
    }

    /// The supervised transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the transport for the first time.
    ///
    /// Failure here is a startup error and is returned, not retried.
    pub fn open(&self) -> Result<()> {
        let _guard = lock(&self.lifecycle);
        if !self.is_running() {
            return Err(LinkError::Stopped);
        }
        if !self.transport.is_open() {
            self.transport.open()?;
        }
        let mut state = lock(&self.state);
        state.status = LinkStatus::Open;
        state.generation += 1;
        info!(transport = self.transport.name(), "link open");
        Ok(())
    }

    /// Recover from an I/O failure observed under `failed_generation`.
    ///
    /// Closes and reopens the transport, waiting the fixed backoff between
    /// attempts, with no attempt limit. Returns `Ok` once the link is open
    /// (immediately if another caller already reopened it since
    /// `failed_generation`), or [`LinkError::Stopped`] once a stop was
    /// requested.
    pub fn reconnect(&self, failed_generation: u64) -> Result<()> {
        let _guard = lock(&self.lifecycle);
        {
            let mut state = lock(&self.state);
            if state.status == LinkStatus::Closed || !self.is_running() {
                return Err(LinkError::Stopped);
            }
            if state.status == LinkStatus::Open && state.generation != failed_generation {
                debug!(
                    generation = state.generation,
                    failed_generation, "link already reopened"
                );
                return Ok(());
            }
            state.status = LinkStatus::Reconnecting;
        }

        warn!(transport = self.transport.name(), "attempting to reopen port");
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            match self.reopen() {
                Ok(()) => {
                    let mut state = lock(&self.state);
                    state.status = LinkStatus::Open;
                    state.generation += 1;
                    state.stats.reconnects += 1;
                    info!(attempt, generation = state.generation, "successfully reopened port");
                    return Ok(());
                }
                Err(err) => error!(attempt, error = %err, "error while reopening port"),
            }

            if !self.is_running() {
                debug!(attempt, "stop requested; giving up reconnect");
                return Err(LinkError::Stopped);
            }
            std::thread::sleep(self.backoff);
        }
    }

    fn reopen(&self) -> rmserial_transport::Result<()> {
        if self.transport.is_open() {
            self.transport.close()?;
        }
        self.transport.open()
    }

    /// Ask every loop to stop at its next check.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether no stop has been requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop, close the transport, and mark the link closed for good.
    ///
    /// Waits for an in-progress reconnect to observe the stop first.
    pub fn shutdown(&self) -> Result<()> {
        self.request_stop();
        let _guard = lock(&self.lifecycle);
        lock(&self.state).status = LinkStatus::Closed;
        if self.transport.is_open() {
            self.transport.close()?;
        }
        info!(transport = self.transport.name(), "link closed");
        Ok(())
    }

    pub fn status(&self) -> LinkStatus {
        lock(&self.state).status
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Last robot color confirmed by the remote side.
    pub fn robot_color(&self) -> Option<RobotColor> {
        lock(&self.state).robot_color
    }

    pub fn stats(&self) -> LinkStats {
        lock(&self.state).stats
    }

    /// Run `f` with exclusive access to the link state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut LinkState) -> R) -> R {
        f(&mut lock(&self.state))
    }

    pub(crate) fn state_handle(&self) -> Arc<Mutex<LinkState>> {
        Arc::clone(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rmserial_transport::MemoryTransport;

    use super::*;

    const BACKOFF: Duration = Duration::from_millis(20);

    fn open_supervisor() -> Arc<LinkSupervisor<Arc<MemoryTransport>>> {
        let transport = Arc::new(MemoryTransport::new());
        let supervisor = Arc::new(LinkSupervisor::new(transport, BACKOFF));
        supervisor.open().unwrap();
        supervisor
    }

    #[test]
    fn open_marks_link_open() {
        let supervisor = open_supervisor();
        assert_eq!(supervisor.status(), LinkStatus::Open);
        assert_eq!(supervisor.generation(), 1);
        assert!(supervisor.transport().is_open());
    }

    #[test]
    fn open_failure_is_returned_not_retried() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next_opens(1);
        let supervisor = LinkSupervisor::new(Arc::clone(&transport), BACKOFF);

        assert!(matches!(supervisor.open(), Err(LinkError::Transport(_))));
        assert_eq!(transport.open_attempts(), 1);
        assert_eq!(supervisor.status(), LinkStatus::Closed);
    }

    #[test]
    fn reconnect_closes_then_reopens() {
        let supervisor = open_supervisor();
        supervisor.reconnect(1).unwrap();

        assert_eq!(supervisor.status(), LinkStatus::Open);
        assert_eq!(supervisor.generation(), 2);
        assert_eq!(supervisor.stats().reconnects, 1);
        assert_eq!(supervisor.transport().open_attempts(), 2);
    }

    #[test]
    fn reconnect_retries_with_fixed_backoff_until_open_succeeds() {
        let supervisor = open_supervisor();
        supervisor.transport().fail_next_opens(4);

        let started = Instant::now();
        supervisor.reconnect(1).unwrap();
        let elapsed = started.elapsed();

        // one initial open, four failures, one success
        assert_eq!(supervisor.transport().open_attempts(), 6);
        assert!(elapsed >= BACKOFF * 4, "expected 4 backoff waits, took {elapsed:?}");
        assert_eq!(supervisor.status(), LinkStatus::Open);
        assert!(supervisor.transport().is_open());
    }

    #[test]
    fn stale_failure_report_does_not_reopen_again() {
        let supervisor = open_supervisor();
        supervisor.reconnect(1).unwrap();
        let attempts = supervisor.transport().open_attempts();

        supervisor.reconnect(1).unwrap();
        assert_eq!(supervisor.transport().open_attempts(), attempts);
        assert_eq!(supervisor.generation(), 2);
    }

    #[test]
    fn concurrent_failure_reports_reopen_once() {
        let supervisor = open_supervisor();
        supervisor.transport().fail_next_opens(2);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let supervisor = Arc::clone(&supervisor);
                std::thread::spawn(move || supervisor.reconnect(1))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(supervisor.generation(), 2);
        assert_eq!(supervisor.stats().reconnects, 1);
    }

    #[test]
    fn stop_ends_endless_reconnect() {
        let supervisor = open_supervisor();
        supervisor.transport().fail_next_opens(usize::MAX);

        let worker = {
            let supervisor = Arc::clone(&supervisor);
            std::thread::spawn(move || supervisor.reconnect(1))
        };

        while supervisor.transport().open_attempts() < 4 {
            std::thread::sleep(Duration::from_millis(5));
        }
        supervisor.shutdown().unwrap();

        assert!(matches!(worker.join().unwrap(), Err(LinkError::Stopped)));
        assert_eq!(supervisor.status(), LinkStatus::Closed);
        assert!(!supervisor.transport().is_open());
    }

    #[test]
    fn reconnect_after_shutdown_is_stopped() {
        let supervisor = open_supervisor();
        supervisor.shutdown().unwrap();

        assert!(matches!(supervisor.reconnect(1), Err(LinkError::Stopped)));
        assert!(matches!(supervisor.open(), Err(LinkError::Stopped)));
        assert!(!supervisor.transport().is_open());
    }

    #[test]
    fn with_state_gives_exclusive_access() {
        let supervisor = open_supervisor();
        supervisor.with_state(|state| state.robot_color = Some(RobotColor::Blue));
        assert_eq!(supervisor.robot_color(), Some(RobotColor::Blue));
    }
}
