//! Bounded retries for I/O that can fail transiently
//!
//! Freshly written files may still be held open by an antivirus scanner or
//! the process that produced them. Such failures are retried a few times
//! with a short fixed delay; anything else fails immediately.

use async_io::Timer;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one; at least one is always made
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(200),
        }
    }
}

/// Whether `error` is worth another attempt
pub fn is_transient(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::ResourceBusy
    ) {
        return true;
    }
    // ERROR_SHARING_VIOLATION and ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(error.raw_os_error(), Some(32) | Some(33))
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
pub async fn retry_io<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                debug!(
                    "Transient I/O error (attempt {}/{}): {}, retrying in {:?}",
                    attempt, attempts, e, policy.delay
                );
                Timer::after(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
