//! Cancellable worker primitives.
//!
//! Every long-running unit in the pipeline follows the same contract:
//! it is started asynchronously, can be waited on until it reaches a
//! terminal state, and can be asked to stop cooperatively. A stop request
//! returns immediately and is only observed at explicit cancellation
//! checkpoints inside the work, never via preemption.
//!
//! This module provides the shared pieces of that contract:
//!
//! - [`WorkerStatus`]: coarse lifecycle state with terminal-state predicates
//! - [`ActiveWorker`]: the controller's back-reference to whichever stage is
//!   currently executing, used purely to forward stop requests

use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a cancellable worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Created but not yet started.
    #[default]
    Pending,

    /// Currently executing.
    Running,

    /// Finished all enabled work.
    Succeeded,

    /// Aborted on an error.
    Failed,

    /// Returned early after observing a stop request.
    Stopped,
}

impl WorkerStatus {
    /// Returns true if the worker has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }

    /// Returns true if the worker has not yet reached a terminal state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the worker completed without error or stop.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Back-reference to the currently executing stage.
///
/// The controller stores the active stage's cancellation token here while
/// the stage runs and clears it when the stage returns. A stop request on
/// the controller forwards through this slot so a collaborator blocked
/// inside the stage unwinds promptly. The slot never owns the stage's
/// lifetime; dropping it does not cancel anything.
#[derive(Debug, Default)]
pub struct ActiveWorker {
    inner: Mutex<Option<CancellationToken>>,
}

impl ActiveWorker {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `token` as the active stage.
    pub fn begin(&self, token: CancellationToken) {
        *self.lock() = Some(token);
    }

    /// Clears the slot once the stage has returned.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Forwards a stop request to the active stage, if any.
    pub fn stop(&self) {
        if let Some(token) = self.lock().as_ref() {
            token.cancel();
        }
    }

    /// Returns true while a stage is registered as active.
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        // The slot holds no invariants worth poisoning over.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_terminal() {
        assert!(!WorkerStatus::Pending.is_terminal());
        assert!(!WorkerStatus::Running.is_terminal());
        assert!(WorkerStatus::Succeeded.is_terminal());
        assert!(WorkerStatus::Failed.is_terminal());
        assert!(WorkerStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_status_is_active() {
        assert!(WorkerStatus::Pending.is_active());
        assert!(WorkerStatus::Running.is_active());
        assert!(!WorkerStatus::Stopped.is_active());
    }

    #[test]
    fn test_status_is_success() {
        assert!(WorkerStatus::Succeeded.is_success());
        assert!(!WorkerStatus::Failed.is_success());
        assert!(!WorkerStatus::Stopped.is_success());
    }

    #[test]
    fn test_status_default_is_pending() {
        assert_eq!(WorkerStatus::default(), WorkerStatus::Pending);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", WorkerStatus::Running), "Running");
        assert_eq!(format!("{}", WorkerStatus::Stopped), "Stopped");
    }

    #[test]
    fn test_active_worker_forwards_stop() {
        let slot = ActiveWorker::new();
        let token = CancellationToken::new();

        slot.begin(token.clone());
        assert!(slot.is_active());

        slot.stop();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_active_worker_stop_after_clear_is_noop() {
        let slot = ActiveWorker::new();
        let token = CancellationToken::new();

        slot.begin(token.clone());
        slot.clear();
        assert!(!slot.is_active());

        slot.stop();
        assert!(!token.is_cancelled());
    }
}
