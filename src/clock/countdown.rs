//! One-second countdown over a token's time-to-live.

use std::time::Duration;
use tokio::time::{interval, Interval};

/// Countdown resolution.
pub const TICK: Duration = Duration::from_secs(1);

/// An event produced by a running [`TokenClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Seconds left on the displayed token.
    Tick { remaining_secs: u64 },
    /// The countdown reached zero. Emitted once per `start`.
    Expired,
}

#[derive(Debug)]
struct Countdown {
    remaining_secs: u64,
    ticker: Interval,
}

/// Countdown timer driving a single token display.
///
/// The owner polls [`TokenClock::next_event`]. A countdown started with
/// `ttl` yields `Tick` for `ttl, ttl - 1, ..., 1` one second apart (the
/// first immediately), then `Expired`, then `None` until restarted.
///
/// There is only ever one countdown per clock: `start` drops the previous
/// interval before creating a new one, so a superseded countdown can never
/// deliver another event.
#[derive(Debug, Default)]
pub struct TokenClock {
    active: Option<Countdown>,
}

impl TokenClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the clock and begins counting down from `ttl_secs`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, ttl_secs: u64) {
        self.stop();
        self.active = Some(Countdown {
            remaining_secs: ttl_secs,
            ticker: interval(TICK),
        });
        tracing::debug!(ttl_secs, "token countdown started");
    }

    /// Cancels the countdown. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("token countdown stopped");
        }
    }

    /// Returns true while a countdown has not yet emitted `Expired`.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Waits for the next countdown event.
    ///
    /// Returns `None` immediately when no countdown is running. Cancel safe:
    /// dropping the future before completion loses no tick.
    pub async fn next_event(&mut self) -> Option<ClockEvent> {
        let countdown = self.active.as_mut()?;
        countdown.ticker.tick().await;

        if countdown.remaining_secs == 0 {
            self.active = None;
            tracing::debug!("token countdown expired");
            return Some(ClockEvent::Expired);
        }

        let remaining_secs = countdown.remaining_secs;
        countdown.remaining_secs -= 1;
        Some(ClockEvent::Tick { remaining_secs })
    }
}

/// Formats seconds as `m:ss` for the expiry label.
pub fn format_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
