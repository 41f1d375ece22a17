//! Error policy: requeue failed installations with a per-installation
//! Fibonacci backoff. The backoff resets on the next successful pass.

use super::{object_key, Context, RuntimeError};
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::Installation;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::{Arc, PoisonError};
use tracing::error;

/// Backoff state for a specific installation
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

pub fn error_policy(
    installation: Arc<Installation>,
    error: &RuntimeError,
    ctx: Arc<Context>,
) -> Action {
    metrics::increment_reconciliation_errors();

    let key = object_key(&installation);
    let mut states = ctx
        .backoff_states
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let state = states.entry(key.clone()).or_insert_with(|| {
        BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
    });
    state.increment_error();
    let delay = state.backoff.next_backoff();

    error!(
        "Reconciliation error for {} (attempt {}), retrying in {}s: {}",
        key,
        state.error_count,
        delay.as_secs(),
        error
    );
    Action::requeue(delay)
}

pub(crate) fn reset_backoff(ctx: &Context, installation: &Installation) {
    ctx.backoff_states
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&object_key(installation));
}
