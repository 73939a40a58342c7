//! Wall-clock sources for record timestamps.

use tokio::time::Instant;

/// Source of the current time in unix seconds
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> u64;
}

/// Reads the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Wall clock anchored to a fixed epoch that advances with tokio's clock.
///
/// Under a paused runtime (`start_paused = true`) it advances exactly as far as
/// `tokio::time::advance` moves, which keeps flush timestamps deterministic.
#[derive(Debug, Clone)]
pub struct InstantClock {
    anchor_seconds: u64,
    anchor: Instant,
}

impl InstantClock {
    pub fn anchored_at(anchor_seconds: u64) -> Self {
        Self {
            anchor_seconds,
            anchor: Instant::now(),
        }
    }
}

impl Clock for InstantClock {
    fn now(&self) -> u64 {
        self.anchor_seconds + self.anchor.elapsed().as_secs()
    }
}
