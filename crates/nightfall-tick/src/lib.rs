//! Phase clock for Nightfall rooms.
//!
//! A game only changes on its own when a deadline passes: the night ends,
//! the defense is over, the vote closes, the victory cooldown runs out, or
//! a dropped player's grace period expires. The room actor polls for those
//! with a [`PhaseClock`], which fires at a fixed interval and reports the
//! instant it fired at. That instant is what the room hands to the engine
//! as "now".
//!
//! The clock sits inside the room's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = clock.wait_for_tick() => {
//!             let events = session.tick(tick.at);
//!         }
//!     }
//! }
//! ```
//!
//! A paused clock, or one with a zero interval, never fires. Rooms pause
//! theirs while nothing is waiting on a deadline.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the clock wakes up more than one interval late.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatePolicy {
    /// Forget the missed ticks and schedule the next one from now.
    #[default]
    Skip,
    /// Keep the configured cadence. Missed ticks fire back to back.
    Keep,
}

/// Phase clock settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Milliseconds between ticks. 0 turns the clock off.
    pub interval_ms: u64,
    pub policy: LatePolicy,
    /// Random delay (0..max ms) before the first tick, so rooms created
    /// together do not all poll on the same instant.
    pub initial_jitter_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            policy: LatePolicy::default(),
            initial_jitter_ms: 50,
        }
    }
}

impl ClockConfig {
    /// Shortest interval a running clock accepts.
    pub const MIN_INTERVAL_MS: u64 = 10;

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Raises a nonzero interval to [`Self::MIN_INTERVAL_MS`].
    pub fn validated(mut self) -> Self {
        if self.interval_ms != 0 && self.interval_ms < Self::MIN_INTERVAL_MS {
            warn!(
                interval_ms = self.interval_ms,
                min = Self::MIN_INTERVAL_MS,
                "clock interval below minimum, raising"
            );
            self.interval_ms = Self::MIN_INTERVAL_MS;
        }
        self
    }

    /// `None` when the clock is off.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

/// One firing of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Starts at 1.
    pub tick: u64,
    /// When the tick fired. Follows Tokio's clock, so it advances with
    /// paused test time too.
    pub at: Instant,
    /// How far past its scheduled instant the tick fired.
    pub late_by: Duration,
    /// Whole intervals skipped because the clock woke up late.
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// PhaseClock
// ---------------------------------------------------------------------------

/// Fixed-interval clock owned by one room actor.
#[derive(Debug)]
pub struct PhaseClock {
    config: ClockConfig,
    interval: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    paused: bool,
}

impl PhaseClock {
    pub fn new(config: ClockConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();

        let next_tick = interval.map(|d| {
            let jitter = if config.initial_jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..config.initial_jitter_ms))
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        match interval {
            Some(d) => debug!(
                interval_ms = d.as_millis() as u64,
                policy = ?config.policy,
                "phase clock created"
            ),
            None => debug!("phase clock created switched off"),
        }

        Self {
            config,
            interval,
            tick_count: 0,
            next_tick,
            paused: false,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(ClockConfig::with_interval(interval))
    }

    /// Waits for the next tick. Pends forever while paused or switched off,
    /// which leaves the other branches of a `select!` in charge.
    pub async fn wait_for_tick(&mut self) -> ClockTick {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        let late_by = now.saturating_duration_since(next);
        let missed = (late_by.as_nanos() / interval.as_nanos()) as u64;

        self.next_tick = Some(match self.config.policy {
            LatePolicy::Skip => {
                if missed > 0 {
                    warn!(
                        tick = self.tick_count,
                        missed,
                        late_ms = late_by.as_millis() as u64,
                        "phase clock behind, skipping ahead"
                    );
                }
                now + interval
            }
            LatePolicy::Keep => next + interval,
        });

        trace!(tick = self.tick_count, "phase clock tick");
        ClockTick {
            tick: self.tick_count,
            at: now.into_std(),
            late_by,
            missed,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "phase clock paused");
        }
    }

    /// Restarts ticking one interval from now. Idempotent.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.interval {
                self.next_tick = Some(TokioInstant::now() + interval);
            }
            debug!(tick = self.tick_count, "phase clock resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_off(&self) -> bool {
        self.interval.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
