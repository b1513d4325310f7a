use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct TimelineState {
    submitted: AtomicU64,
    completed: AtomicU64,
}

/// Monotonic completion counter shared between the submitter of device work and the
/// parties waiting on it.
///
/// Every submission takes the next value; completion only ever moves forward, so a
/// [`SignalPoint`] that has been observed as signaled stays signaled.
#[derive(Clone, Default)]
pub struct Timeline {
    state: Arc<TimelineState>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&self) -> SignalPoint {
        let value = self.state.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        SignalPoint {
            state: Arc::clone(&self.state),
            value,
        }
    }

    pub fn complete_through(&self, value: u64) {
        let value = value.min(self.submitted());
        self.state.completed.fetch_max(value, Ordering::AcqRel);
    }

    pub fn complete_all(&self) {
        self.complete_through(self.submitted());
    }

    pub fn submitted(&self) -> u64 {
        self.state.submitted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("submitted", &self.submitted())
            .field("completed", &self.completed())
            .finish()
    }
}

/// A position on a [`Timeline`]. Keeps the timeline alive for as long as it is held.
#[derive(Clone)]
pub struct SignalPoint {
    state: Arc<TimelineState>,
    value: u64,
}

impl SignalPoint {
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_signaled(&self) -> bool {
        self.state.completed.load(Ordering::Acquire) >= self.value
    }
}

impl fmt::Debug for SignalPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalPoint")
            .field("value", &self.value)
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
