//! One-second countdown interpolated between authoritative deadlines.
//!
//! The server announces "seconds remaining" on many frames. [`Countdown`]
//! holds that value and decrements it once per second until the next
//! announcement replaces it. It never goes below zero and never restarts on
//! its own.
//!
//! Ticks are not applied from a timer callback. A ticker task sends [`Tick`]
//! values into the owner's event queue so that a tick and a server frame can
//! never race: the owner applies both from the same loop. Every restart bumps
//! a generation counter, and a tick from an earlier generation is ignored.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Interval between ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A tick emitted by the ticker for one countdown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
}

/// Countdown owned by one round synchronizer.
///
/// At most one ticker task is alive at a time. [`restart`](Self::restart)
/// and `Drop` go through the same cancel point.
#[derive(Debug)]
pub struct Countdown {
    remaining: u32,
    generation: u64,
    sink: Option<mpsc::UnboundedSender<Tick>>,
    ticker: Option<JoinHandle<()>>,
}

impl Countdown {
    /// A countdown that schedules its own ticks onto `sink`.
    ///
    /// Ticker tasks are spawned on the current tokio runtime.
    pub fn with_ticker(sink: mpsc::UnboundedSender<Tick>) -> Self {
        Self {
            remaining: 0,
            generation: 0,
            sink: Some(sink),
            ticker: None,
        }
    }

    /// A countdown whose ticks are fed in by hand via [`current_tick`](Self::current_tick).
    pub fn manual() -> Self {
        Self {
            remaining: 0,
            generation: 0,
            sink: None,
            ticker: None,
        }
    }

    /// Seconds left as currently displayed.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns `true` while a ticker task is alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// The tick that the current cycle would accept.
    pub fn current_tick(&self) -> Tick {
        Tick {
            generation: self.generation,
        }
    }

    /// Replace the value with an authoritative one and restart ticking from it.
    ///
    /// Negative values clamp to zero. A zero countdown holds without ticking.
    pub fn restart(&mut self, seconds: i64) {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.remaining = u32::try_from(seconds.max(0)).unwrap_or(u32::MAX);
        debug!(
            seconds = self.remaining,
            generation = self.generation,
            "countdown restarted"
        );
        if self.remaining > 0 {
            self.arm();
        }
    }

    /// Apply one tick. Returns `true` if the displayed value changed.
    pub fn on_tick(&mut self, tick: Tick) -> bool {
        if tick.generation != self.generation || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.cancel();
        }
        true
    }

    fn arm(&mut self) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.ticker = Some(handle.spawn(run_ticker(sink, self.current_tick())));
            }
            Err(e) => warn!("countdown cannot tick without a tokio runtime: {e}"),
        }
    }

    fn cancel(&mut self) {
        if let Some(task) = self.ticker.take() {
            task.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_ticker(sink: mpsc::UnboundedSender<Tick>, tick: Tick) {
    let mut interval =
        tokio::time::interval_at(tokio::time::Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if sink.send(tick).is_err() {
            break;
        }
    }
}
