use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::SerialTransport;

/// In-process serial transport.
///
/// Inbound bytes are queued with [`inject`](Self::inject) and consumed by
/// [`receive`](SerialTransport::receive), which blocks until enough bytes are
/// queued, the transport is closed, or input is marked finished. Everything
/// written with [`send`](SerialTransport::send) is captured for inspection.
/// Open, receive and send failures can be scripted to exercise recovery paths.
///
/// Like a tty, a close ends any receive in flight even if the transport is
/// reopened before the reader wakes, and reopening discards input queued
/// before the close.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    readable: Condvar,
}

#[derive(Debug, Default)]
struct MemoryState {
    open: bool,
    /// Bumped on every close.
    session: u64,
    finished: bool,
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    open_attempts: usize,
    open_failures: usize,
    receive_failures: usize,
    send_failures: usize,
}

impl MemoryTransport {
    /// Create a closed transport with no queued input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose input is exactly `bytes`, then end of stream.
    pub fn with_input(bytes: &[u8]) -> Self {
        let transport = Self::new();
        transport.inject(bytes);
        transport.finish_input();
        transport
    }

    /// Queue bytes for subsequent receives.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes.iter().copied());
        self.readable.notify_all();
    }

    /// Mark the input stream finished; receives that cannot be satisfied fail.
    pub fn finish_input(&self) {
        self.lock().finished = true;
        self.readable.notify_all();
    }

    /// Drain everything sent so far.
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().outbound)
    }

    /// Number of queued bytes not yet received.
    pub fn pending_input(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Total number of `open` calls, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Fail the next `count` calls to `open`.
    pub fn fail_next_opens(&self, count: usize) {
        self.lock().open_failures = count;
    }

    /// Fail the next `count` calls to `receive`, waking a blocked reader.
    pub fn fail_next_receives(&self, count: usize) {
        self.lock().receive_failures = count;
        self.readable.notify_all();
    }

    /// Fail the next `count` calls to `send`.
    pub fn fail_next_sends(&self, count: usize) {
        self.lock().send_failures = count;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SerialTransport for MemoryTransport {
    fn open(&self) -> Result<()> {
        let mut state = self.lock();
        state.open_attempts += 1;
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "injected open failure",
            )));
        }
        if state.session > 0 && !state.open {
            let flushed = state.inbound.len();
            state.inbound.clear();
            if flushed > 0 {
                debug!(flushed, "discarded stale input on reopen");
            }
        }
        state.open = true;
        debug!(attempt = state.open_attempts, "memory transport opened");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.session += 1;
        }
        drop(state);
        self.readable.notify_all();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn receive(&self, buf: &mut [u8]) -> Result<()> {
        let mut state = self.lock();
        let session = state.session;
        while state.open
            && state.session == session
            && state.receive_failures == 0
            && !state.finished
            && state.inbound.len() < buf.len()
        {
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        if !state.open || state.session != session {
            return Err(TransportError::NotOpen);
        }
        if state.receive_failures > 0 {
            state.receive_failures -= 1;
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "injected receive failure",
            )));
        }
        if state.inbound.len() < buf.len() {
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "end of input",
            )));
        }

        let len = buf.len();
        for (dst, src) in buf.iter_mut().zip(state.inbound.drain(..len)) {
            *dst = src;
        }
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.send_failures > 0 {
            state.send_failures -= 1;
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "injected send failure",
            )));
        }
        state.outbound.extend_from_slice(buf);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
