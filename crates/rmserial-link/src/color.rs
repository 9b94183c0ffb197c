use std::sync::{Mutex, MutexGuard};

use rmserial_frame::RobotColor;

use crate::error::NegotiationError;

/// Callback reporting the outcome of a [`ColorNegotiator::request_set`].
///
/// May run on any thread, including synchronously inside `request_set`.
pub type Completion = Box<dyn FnOnce(Result<(), NegotiationError>) + Send + 'static>;

/// Remote channel that owns the detection-color parameter.
pub trait ColorNegotiator: Send + Sync {
    /// Whether the remote side can accept a request now.
    fn is_ready(&self) -> bool;

    /// Ask the remote side to detect `detect_color`. Must not block on the
    /// remote answer; `done` reports it later.
    fn request_set(&self, detect_color: RobotColor, done: Completion);

    /// Current remote detection color, if it can be read.
    fn current(&self) -> Result<Option<RobotColor>, NegotiationError> {
        Ok(None)
    }
}

/// In-process detection-color parameter.
///
/// Accepts every request immediately unless told otherwise. Readiness,
/// rejection and deferred completion can be toggled to stand in for a
/// remote service.
#[derive(Default)]
pub struct SharedParameter {
    inner: Mutex<ParameterState>,
}

#[derive(Default)]
struct ParameterState {
    unavailable: bool,
    value: Option<RobotColor>,
    reject: Option<String>,
    defer: bool,
    deferred: Vec<(RobotColor, Completion)>,
    requests: usize,
}

impl SharedParameter {
    /// A ready parameter with no value.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ready parameter holding `color`.
    pub fn with_value(color: RobotColor) -> Self {
        let parameter = Self::new();
        parameter.lock().value = Some(color);
        parameter
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().unavailable = !ready;
    }

    /// Reject subsequent requests with `reason`, or accept them again on `None`.
    pub fn set_reject(&self, reason: Option<&str>) {
        self.lock().reject = reason.map(str::to_owned);
    }

    /// Hold completions until [`complete_deferred`](Self::complete_deferred).
    pub fn set_defer(&self, defer: bool) {
        self.lock().defer = defer;
    }

    /// Answer every held request; returns how many were answered.
    pub fn complete_deferred(&self) -> usize {
        let deferred = std::mem::take(&mut self.lock().deferred);
        let count = deferred.len();
        for (color, done) in deferred {
            done(self.apply(color));
        }
        count
    }

    /// Number of `request_set` calls received.
    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    pub fn value(&self) -> Option<RobotColor> {
        self.lock().value
    }

    fn apply(&self, color: RobotColor) -> Result<(), NegotiationError> {
        let mut state = self.lock();
        if let Some(reason) = &state.reject {
            return Err(NegotiationError::Rejected(reason.clone()));
        }
        state.value = Some(color);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ParameterState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ColorNegotiator for SharedParameter {
    fn is_ready(&self) -> bool {
        !self.lock().unavailable
    }

    fn request_set(&self, detect_color: RobotColor, done: Completion) {
        {
            let mut state = self.lock();
            state.requests += 1;
            if state.defer {
                state.deferred.push((detect_color, done));
                return;
            }
        }
        done(self.apply(detect_color));
    }

    fn current(&self) -> Result<Option<RobotColor>, NegotiationError> {
        Ok(self.lock().value)
    }
}
