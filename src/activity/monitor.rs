//! Periodic idle sampling.
//!
//! The monitor knows nothing about the session engine. It samples the
//! idle source on its own interval and forwards every successful sample
//! as an [`IdleReport`]; the engine decides whether a report matters.
//!
//! At most one query runs at a time. A query that outlives its timeout
//! keeps the slot until the platform call returns, and polls in between
//! are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::IdleError;
use super::source::IdleSource;
use crate::types::DEFAULT_ACTIVITY_THRESHOLD_SECS;

/// Default sampling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for one idle query.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Current monitoring configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Whether samples are taken at all
    pub enabled: bool,
    /// Idle threshold in seconds
    pub threshold_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_seconds: DEFAULT_ACTIVITY_THRESHOLD_SECS,
        }
    }
}

/// One idle sample, with the threshold that was configured when it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleReport {
    /// Elapsed idle time in whole seconds
    pub idle_seconds: u64,
    /// Threshold in effect for this sample
    pub threshold_seconds: u64,
}

impl IdleReport {
    /// Returns true if the idle time is at or above the threshold.
    #[must_use]
    pub fn exceeds_threshold(&self) -> bool {
        self.idle_seconds >= self.threshold_seconds
    }
}

/// Samples an [`IdleSource`] periodically and reports the results.
pub struct IdleMonitor {
    source: Arc<dyn IdleSource>,
    config: watch::Sender<MonitorConfig>,
    poll_interval: Duration,
    query_timeout: Duration,
}

impl IdleMonitor {
    /// Creates a disabled monitor over the given source.
    pub fn new(source: Arc<dyn IdleSource>) -> Self {
        let (config, _) = watch::channel(MonitorConfig::default());
        Self {
            source,
            config,
            poll_interval: DEFAULT_POLL_INTERVAL,
            query_timeout: QUERY_TIMEOUT,
        }
    }

    /// Overrides the sampling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Overrides the per-query timeout.
    #[must_use]
    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Enables or disables monitoring and sets the threshold.
    ///
    /// Takes effect on the next sample. A zero threshold is raised to one second.
    pub fn configure(&self, enabled: bool, threshold_seconds: u64) {
        let config = MonitorConfig {
            enabled,
            threshold_seconds: threshold_seconds.max(1),
        };
        let previous = self.config.send_replace(config);
        if previous != config {
            info!(
                "Idle monitoring: {} (threshold {}s)",
                if enabled { "enabled" } else { "disabled" },
                config.threshold_seconds
            );
        }
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> MonitorConfig {
        *self.config.borrow()
    }

    /// Spawns the sampling loop.
    ///
    /// The loop exits when `reports` is closed.
    pub fn spawn(&self, reports: mpsc::Sender<IdleReport>) -> JoinHandle<()> {
        let sampler = IdleSampler::new(Arc::clone(&self.source), self.query_timeout);
        let config_rx = self.config.subscribe();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut reported_unsupported = false;
            let mut failing = false;

            loop {
                ticker.tick().await;

                let config = *config_rx.borrow();
                if !config.enabled {
                    continue;
                }

                match sampler.sample().await {
                    Ok(idle) => {
                        if failing {
                            info!("Idle sampling recovered");
                            failing = false;
                        }
                        let report = IdleReport {
                            idle_seconds: idle.as_secs(),
                            threshold_seconds: config.threshold_seconds,
                        };
                        if reports.send(report).await.is_err() {
                            debug!("Idle report receiver dropped; monitor exiting");
                            break;
                        }
                    }
                    Err(e) if e.is_unsupported() => {
                        if !reported_unsupported {
                            warn!("{} ({})", e, e.suggestion());
                            reported_unsupported = true;
                        }
                    }
                    Err(e) if e.is_busy() => debug!("Idle sample skipped: {}", e),
                    Err(e) => {
                        // First failure of a streak is visible at the daemon's default level.
                        if failing {
                            debug!("Idle sample skipped: {}", e);
                        } else {
                            warn!("{} ({})", e, e.suggestion());
                            failing = true;
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for IdleMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleMonitor")
            .field("config", &self.config())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// IdleSampler
// ============================================================================

/// Runs idle queries on the blocking pool, one at a time, each bounded by
/// a timeout.
#[derive(Clone)]
pub struct IdleSampler {
    source: Arc<dyn IdleSource>,
    limit: Duration,
    in_flight: Arc<AtomicBool>,
}

impl IdleSampler {
    pub fn new(source: Arc<dyn IdleSource>, limit: Duration) -> Self {
        Self {
            source,
            limit,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true while a query (possibly a timed-out one) is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Takes one sample.
    ///
    /// # Errors
    ///
    /// Returns `IdleError::Busy` without querying while an earlier query is
    /// still running, `IdleError::Timeout` when this query exceeds the
    /// limit, or the source's own error.
    pub async fn sample(&self) -> Result<Duration, IdleError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(IdleError::Busy);
        }

        let slot = InFlightSlot(Arc::clone(&self.in_flight));
        let source = Arc::clone(&self.source);
        let query = tokio::task::spawn_blocking(move || {
            let _slot = slot;
            source.idle_time()
        });

        match timeout(self.limit, query).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(IdleError::QueryFailed(join_error.to_string())),
            Err(_) => Err(IdleError::Timeout(self.limit.as_secs())),
        }
    }
}

impl std::fmt::Debug for IdleSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleSampler")
            .field("limit", &self.limit)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Releases the sampler slot when the blocking query ends, even on panic.
struct InFlightSlot(Arc<AtomicBool>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
