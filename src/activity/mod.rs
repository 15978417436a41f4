//! User activity (idle) monitoring.
//!
//! - [`IdleSource`]: platform idle-time query (`user-idle`)
//! - [`IdleSampler`]: timeout-bounded queries, one in flight at a time
//! - [`IdleMonitor`]: periodic sampler that emits [`IdleReport`]s
//!
//! Monitoring is advisory: failures degrade to "no report" and never
//! affect the session timer.

mod error;
mod monitor;
mod source;

pub use error::IdleError;
pub use monitor::{
    IdleMonitor, IdleReport, IdleSampler, MonitorConfig, DEFAULT_POLL_INTERVAL, QUERY_TIMEOUT,
};
pub use source::{IdleSource, MockIdleSource, SystemIdleSource};
