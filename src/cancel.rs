//! Cooperative cancellation token threaded through every long-running operation.
//!
//! Grounded on the teacher's use of `std::sync::atomic` for interrupt state
//! (`commands/command_executor.rs`) and `signal-hook` for SIGINT delivery;
//! generalized here into a reusable, clonable token since the engine (unlike
//! the teacher) is meant to be driven by non-interactive automation as well
//! as a CLI.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheap, clonable flag checked between suspension points.
///
/// Cloning shares the underlying flag: cancelling one handle cancels every
/// clone. The CLI binary installs a signal handler that calls [`cancel`](Self::cancel)
/// on a token threaded through the command it is running; library code never
/// installs signal handlers itself.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(TicketFlowError::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), crate::error::TicketFlowError> {
        if self.is_cancelled() {
            Err(crate::error::TicketFlowError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Exposes the underlying flag so the CLI binary can hand it to
    /// `signal_hook::flag::register` without this crate depending on
    /// signal handling itself.
    pub fn as_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().is_err());
    }
}
