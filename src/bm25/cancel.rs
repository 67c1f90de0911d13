//! Cooperative cancellation for search calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{KwrankError, Result};

/// Cancellation token shared between a caller and a running search.
///
/// Clones share the same flag, so the caller keeps one clone and cancels it
/// from any thread. An optional deadline turns into
/// [`KwrankError::TimedOut`] once passed.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Instant>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Create a token without a deadline.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline: None,
        }
    }

    /// Create a token that times out `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            started,
            deadline: Some(started + timeout),
        }
    }

    /// Cancel every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Time since the token was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the token was cancelled or its deadline passed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(KwrankError::cancelled("search cancelled by caller"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(KwrankError::timed_out(self.elapsed()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());

        token.cancel();
        assert!(worker.is_cancelled());
        assert_eq!(worker.check().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        let err = token.check().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_generous_deadline_passes() {
        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        assert!(token.check().is_ok());
    }
}
