//! Poll jobs, one per remote collection.
//!
//! Each poller implements [`Pollable`]: the scheduler asks [`Pollable::ready`]
//! before invoking [`Pollable::execute`] for one cycle. A cycle fetches the
//! full listing, fans per-item handling out over a [`WorkerPool`] and hands
//! results to the [`PublishCoordinator`](crate::PublishCoordinator).
//!
//! Overlapping cycles of the same poller never run: an `execute` that finds
//! the previous one still in flight returns `Ok(())` immediately.
//!
//! [`WorkerPool`]: crate::WorkerPool

mod product;
mod proxy;
mod spec;

pub use product::ProductPoller;
pub use proxy::ProxyPoller;
pub use spec::SpecPoller;

use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Job lifecycle exposed to a scheduler.
#[async_trait]
pub trait Pollable: Send + Sync {
    /// Component name used in logs.
    fn name(&self) -> &'static str;

    /// Whether a cycle may run now.
    fn ready(&self) -> bool;

    /// Run one poll cycle.
    ///
    /// Fails only when the listing itself cannot be fetched. Per-item
    /// failures are logged and skipped.
    async fn execute(&self) -> Result<()>;

    /// Liveness probe.
    fn status(&self) -> Result<()>;
}

/// Shared flag set once a poller has completed its first full cycle.
#[derive(Debug, Clone, Default)]
pub struct FirstRunSignal(Arc<AtomicBool>);

impl FirstRunSignal {
    /// Whether the first cycle has completed.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Overlap guard and first-run tracking of one poller.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    running: Mutex<bool>,
    first_run: FirstRunSignal,
}

impl RunState {
    /// Claim the running flag, or `None` when a cycle is in flight.
    ///
    /// The flag is released when the guard drops, including on early
    /// returns and errors.
    pub(crate) fn try_begin(&self) -> Option<RunGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if *running {
            return None;
        }
        *running = true;
        Some(RunGuard { state: self })
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn complete_first_run(&self) {
        self.first_run.set();
    }

    pub(crate) fn first_run(&self) -> FirstRunSignal {
        self.first_run.clone()
    }
}

pub(crate) struct RunGuard<'a> {
    state: &'a RunState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self
            .state
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_guard_blocks_overlap() {
        let state = RunState::default();
        let guard = state.try_begin();
        assert!(guard.is_some());
        assert!(state.is_running());
        assert!(state.try_begin().is_none());

        drop(guard);
        assert!(!state.is_running());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn test_first_run_signal_is_shared() {
        let state = RunState::default();
        let signal = state.first_run();
        assert!(!signal.is_set());
        state.complete_first_run();
        assert!(signal.is_set());
    }
}
