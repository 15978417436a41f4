//! Platform idle-time sources.
//!
//! [`SystemIdleSource`] reads the system-wide input idle time through the
//! `user-idle` crate (IOKit on macOS, X11 screensaver on Linux,
//! `GetLastInputInfo` on Windows). Other platforms report
//! [`IdleError::Unsupported`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use super::error::IdleError;

/// Reports how long the user has been idle system-wide.
///
/// Queries may block, so callers run them on the blocking pool.
pub trait IdleSource: Send + Sync {
    /// Returns the current system-wide input idle duration.
    ///
    /// # Errors
    ///
    /// Returns an `IdleError` if the platform query fails.
    fn idle_time(&self) -> Result<Duration, IdleError>;
}

// ============================================================================
// SystemIdleSource
// ============================================================================

/// Idle source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdleSource;

impl SystemIdleSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
impl IdleSource for SystemIdleSource {
    fn idle_time(&self) -> Result<Duration, IdleError> {
        let idle = user_idle::UserIdle::get_time()
            .map_err(|e| IdleError::QueryFailed(format!("{:?}", e)))?;
        let seconds = idle.as_seconds();
        trace!("System idle time: {}s", seconds);
        Ok(Duration::from_secs(seconds))
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
impl IdleSource for SystemIdleSource {
    fn idle_time(&self) -> Result<Duration, IdleError> {
        trace!("No idle source on {}", std::env::consts::OS);
        Err(IdleError::Unsupported(std::env::consts::OS.to_string()))
    }
}

// ============================================================================
// MockIdleSource
// ============================================================================

/// Mock idle source for testing.
///
/// Queued samples are returned first, in order; once the queue is empty
/// the fallback value is returned on every query.
#[derive(Debug)]
pub struct MockIdleSource {
    queued: Mutex<VecDeque<Result<Duration, IdleError>>>,
    fallback: Mutex<Result<Duration, IdleError>>,
    query_count: AtomicUsize,
}

impl Default for MockIdleSource {
    fn default() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(Duration::ZERO)),
            query_count: AtomicUsize::new(0),
        }
    }
}

impl MockIdleSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the idle time returned once the queue is empty.
    pub fn set_idle(&self, idle: Duration) {
        *lock(&self.fallback) = Ok(idle);
    }

    /// Makes every unqueued query fail.
    pub fn set_error(&self, error: IdleError) {
        *lock(&self.fallback) = Err(error);
    }

    /// Queues one sample.
    pub fn push(&self, sample: Result<Duration, IdleError>) {
        lock(&self.queued).push_back(sample);
    }

    #[must_use]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IdleSource for MockIdleSource {
    fn idle_time(&self) -> Result<Duration, IdleError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if let Some(sample) = lock(&self.queued).pop_front() {
            return sample;
        }
        lock(&self.fallback).clone()
    }
}
