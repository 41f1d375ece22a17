//! # Cancellation
//!
//! Cooperative cancellation shared between the runtime and reconcilers.
//!
//! Long-running steps check the signal at their boundaries (before each
//! artifact fetch, before each resource write). Every mutating call against
//! the store is a single atomic request, so stopping between calls never
//! leaves a half-written cache record or resource behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable cancellation signal
///
/// Cancellation is idempotent; the first reason is kept.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self
                .inner
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
