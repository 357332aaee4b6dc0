//! One-shot cross-view navigation token.
//!
//! Another part of the application deposits a trace id here (e.g. "open this
//! trace"); the trace controller takes it exactly once when it starts.

#[cfg(test)]
#[path = "navigation_test.rs"]
mod navigation_test;

use std::sync::{Mutex, PoisonError};

/// A pre-selected trace id waiting to be consumed.
#[derive(Debug, Default)]
pub struct PendingTraceSelection {
    slot: Mutex<Option<String>>,
}

impl PendingTraceSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a trace id, replacing any unconsumed one.
    pub fn deposit(&self, trace_id: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(trace_id.into());
    }

    /// Take the pending id, leaving the slot empty.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}
