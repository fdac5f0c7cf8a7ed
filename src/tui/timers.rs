//! Periodic ticks driving the dashboard loop.

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Redraw cadence when nothing else happens (clock, status expiry)
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Evict expired alerts
    Sweep,
    Redraw,
}

/// Sweep and redraw intervals. The sweep runs on its own period whatever
/// the redraw cadence is.
pub struct Timers {
    sweep: Interval,
    redraw: Interval,
}

impl Timers {
    pub fn new(sweep_every: Duration, redraw_every: Duration) -> Self {
        let mut sweep = interval(sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut redraw = interval(redraw_every);
        redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { sweep, redraw }
    }

    /// Wait for the next tick. Cancel safe.
    pub async fn next(&mut self) -> Tick {
        tokio::select! {
            biased;
            _ = self.sweep.tick() => Tick::Sweep,
            _ = self.redraw.tick() => Tick::Redraw,
        }
    }
}
