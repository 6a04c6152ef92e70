//! Cooperative cancellation for long-running fits.
//!
//! A [`CancelToken`] combines a shared flag with an optional wall-clock
//! deadline. The fit loop polls it between trajectories and between batches;
//! when it fires, the in-progress generation is discarded and the run
//! surfaces [`crate::smc::AbcError::Cancelled`], leaving every committed
//! generation intact.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires unless [`CancelToken::cancel`] is called.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// A token that additionally fires once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken { cancelled: Arc::new(AtomicBool::new(false)), deadline: Some(Instant::now() + timeout) }
    }

    /// Request cancellation; all clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the flag is set or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Flag propagation across clones.
    // - Deadline expiry.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Cancelling one clone is visible from every other clone.
    //
    // Given
    // -----
    // - A token and its clone.
    //
    // Expect
    // ------
    // - Both report not-cancelled initially and cancelled after `cancel`.
    fn cancel_propagates_across_clones() {
        // Arrange
        let token = CancelToken::new();
        let clone = token.clone();

        // Act / Assert
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    // Purpose
    // -------
    // A zero timeout fires immediately; a long timeout does not.
    //
    // Given
    // -----
    // - Tokens with 0 ns and 1 hour deadlines.
    //
    // Expect
    // ------
    // - The former is cancelled at once, the latter is not.
    fn deadline_expiry_fires_token() {
        // Arrange / Act / Assert
        assert!(CancelToken::with_timeout(Duration::from_nanos(0)).is_cancelled());
        assert!(!CancelToken::with_timeout(Duration::from_secs(3600)).is_cancelled());
    }
}
