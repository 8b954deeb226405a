//! Cancellation primitives for blocking waits.
//!
//! A [`CancellationToken`] is shared between the party that may cancel and the
//! worker that waits. Sleeping through the token wakes up as soon as the token
//! is cancelled instead of finishing the full interval.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Shared {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// Cancellation token for controlling execution
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token sharing this one's cancellation, that also expires after `timeout`.
    ///
    /// The earlier of the two deadlines wins when this token already has one.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            shared: Arc::clone(&self.shared),
            deadline: Some(self.deadline.map_or(deadline, |current| current.min(deadline))),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.shared.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the deadline set by [`CancellationToken::with_timeout`] has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Blocks for `duration`, returning early on cancellation or at the deadline.
    pub fn sleep(&self, duration: Duration) -> CancellableResult<()> {
        let now = Instant::now();
        let mut wake_at = now + duration;
        if let Some(deadline) = self.deadline {
            wake_at = wake_at.min(deadline);
        }

        let mut cancelled = self
            .shared
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return CancellableResult::Cancelled;
            }
            let now = Instant::now();
            if now >= wake_at {
                break;
            }
            cancelled = self
                .shared
                .signal
                .wait_timeout(cancelled, wake_at - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(cancelled);

        if self.is_expired() {
            CancellableResult::TimedOut
        } else {
            CancellableResult::Completed(())
        }
    }
}

/// Result of a cancellable operation
#[derive(Debug, PartialEq)]
pub enum CancellableResult<T> {
    Completed(T),
    Cancelled,
    /// The token's deadline passed first.
    TimedOut,
}

impl<T> CancellableResult<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancellableResult::Cancelled)
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, CancellableResult::TimedOut)
    }
}

/// Utility for cancellable polling operations
pub struct CancellablePoller {
    cancellation_token: CancellationToken,
    poll_interval: Duration,
}

impl CancellablePoller {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self::with_interval(cancellation_token, Duration::from_millis(500))
    }

    pub fn with_interval(cancellation_token: CancellationToken, interval: Duration) -> Self {
        Self {
            cancellation_token,
            poll_interval: interval,
        }
    }

    /// Poll a closure until it returns `Some(value)`, cancellation is requested
    /// or the token's deadline passes.
    ///
    /// The closure runs once immediately, then once per interval.
    pub fn poll_until<T, F>(&self, mut check_fn: F) -> CancellableResult<T>
    where
        F: FnMut() -> Option<T>,
    {
        loop {
            if self.cancellation_token.is_cancelled() {
                return CancellableResult::Cancelled;
            }
            if self.cancellation_token.is_expired() {
                return CancellableResult::TimedOut;
            }

            if let Some(result) = check_fn() {
                return CancellableResult::Completed(result);
            }

            match self.cancellation_token.sleep(self.poll_interval) {
                CancellableResult::Completed(()) => {}
                CancellableResult::Cancelled => return CancellableResult::Cancelled,
                CancellableResult::TimedOut => return CancellableResult::TimedOut,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancellable_poller_immediate_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let poller = CancellablePoller::new(token);
        let result = poller.poll_until(|| Some("result"));

        assert!(result.is_cancelled());
    }

    #[test]
    fn test_cancellable_poller_completion() {
        let token = CancellationToken::new();
        let poller = CancellablePoller::with_interval(token, Duration::from_millis(1));

        let mut counter = 0;
        let result = poller.poll_until(|| {
            counter += 1;
            if counter >= 3 { Some("completed") } else { None }
        });

        assert_eq!(result, CancellableResult::Completed("completed"));
        assert_eq!(counter, 3);
    }

    #[test]
    fn test_cancellation_wakes_a_long_sleep() {
        let token = CancellationToken::new();
        let poller = CancellablePoller::with_interval(token.clone(), Duration::from_secs(60));

        let cancel_token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel_token.cancel();
        });

        let started = Instant::now();
        let result = poller.poll_until(|| -> Option<()> { None });

        assert!(result.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_poller_times_out_at_deadline() {
        let token = CancellationToken::new().with_timeout(Duration::from_millis(30));
        let poller = CancellablePoller::with_interval(token, Duration::from_millis(5));

        let result = poller.poll_until(|| -> Option<()> { None });

        assert!(result.is_timed_out());
    }

    mod token {
        use super::*;

        #[test]
        fn test_cancellation_token_clone() {
            let token = CancellationToken::new();
            let token_clone = token.clone();

            assert!(!token.is_cancelled());
            token.cancel();
            assert!(token_clone.is_cancelled());
        }

        #[test]
        fn test_timeout_token_shares_cancellation() {
            let parent = CancellationToken::new();
            let child = parent.with_timeout(Duration::from_secs(60));

            assert!(!child.is_expired());
            parent.cancel();
            assert!(child.is_cancelled());
        }

        #[test]
        fn test_earliest_deadline_wins() {
            let short = CancellationToken::new().with_timeout(Duration::from_millis(10));
            let long = short.with_timeout(Duration::from_secs(60));

            assert_eq!(short.deadline(), long.deadline());
        }

        #[test]
        fn test_sleep_completes_without_cancellation() {
            let token = CancellationToken::new();
            assert_eq!(
                token.sleep(Duration::from_millis(1)),
                CancellableResult::Completed(())
            );
        }
    }
}
