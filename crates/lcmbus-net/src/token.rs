use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{NetError, Result};

/// A cancellation token with an optional deadline.
///
/// Cloned tokens share one trip flag: cancelling any clone cancels them
/// all. The deadline, when present, is propagated to the socket as a read
/// or write timeout before each blocking call; a tripped token or an
/// elapsed deadline surfaces as [`NetError::Cancelled`] from the operation
/// in progress. The object under cancellation stays usable with a fresh
/// token afterwards.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    /// A token that never fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::default(),
            deadline: Some(deadline),
        }
    }

    /// A token that fires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Trip the token, waking any in-progress [`CancelToken::sleep`].
    pub fn cancel(&self) {
        *self.lock() = true;
        self.inner.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        if *self.lock() {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` means no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Error out if the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(NetError::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `duration`, waking early with [`NetError::Cancelled`]
    /// when the token trips or the deadline elapses.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let wake = Instant::now() + duration;
        let mut cancelled = self.lock();
        loop {
            if *cancelled {
                return Err(NetError::Cancelled);
            }
            let now = Instant::now();
            if matches!(self.deadline, Some(d) if now >= d) {
                return Err(NetError::Cancelled);
            }
            if now >= wake {
                return Ok(());
            }
            let mut wait = wake - now;
            if let Some(d) = self.deadline {
                wait = wait.min(d.saturating_duration_since(now));
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(cancelled, wait)
                .unwrap_or_else(|e| e.into_inner());
            cancelled = guard;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_never_fires() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.remaining().is_none());
        token.check().unwrap();
        token.sleep(Duration::from_millis(1)).unwrap();
    }

    #[test]
    fn deadline_elapses() {
        let token = CancelToken::with_timeout(Duration::from_millis(5));
        assert!(!token.is_cancelled());
        let err = token.sleep(Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, NetError::Cancelled));
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn cancel_wakes_sleeper() {
        let token = CancelToken::new();
        let clone = token.clone();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            clone.cancel();
        });
        let start = Instant::now();
        let err = token.sleep(Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err, NetError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
        waker.join().unwrap();
    }

    #[test]
    fn cancelled_token_fails_check() {
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(NetError::Cancelled)));
        assert!(matches!(
            token.sleep(Duration::ZERO),
            Err(NetError::Cancelled)
        ));
    }
}
