//! 1 Hz tick source for the engine runtime.

use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Default tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Periodic tick that catches up after delays.
///
/// Missed ticks are delivered in a burst, so the number of ticks always
/// matches the elapsed running time and the countdown does not drift when
/// the runtime is briefly held up.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    period: Duration,
}

impl Ticker {
    /// Creates a ticker whose first tick is one period from now.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval, period }
    }

    /// Waits for the next tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// Restarts the schedule so the next tick is one period from now.
    ///
    /// Called when the timer (re)starts, so time spent paused never
    /// produces catch-up ticks.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}
