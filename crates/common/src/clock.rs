//! Clock and timing utilities for render progress.
//!
//! Renders are measured against a monotonic epoch recorded when the run
//! starts. This module provides:
//! - A stopwatch with a wall-clock start stamp for reports
//! - Microsecond to second conversion for encoder progress parsing
//! - A throttle that limits how often progress is forwarded

use std::time::Instant;

/// Monotonic stopwatch anchored to the moment a render started.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    /// The instant the stopwatch started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl Stopwatch {
    /// Create a new stopwatch anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Get milliseconds elapsed since start.
    pub fn elapsed_ms(&self) -> u128 {
        self.epoch.elapsed().as_millis()
    }

    /// Wall-clock time at start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Estimated seconds remaining given a completed fraction in `[0, 1]`.
    pub fn eta_secs(&self, fraction: f64) -> f64 {
        if fraction <= 0.0 {
            return 0.0;
        }
        let elapsed = self.elapsed_secs();
        ((elapsed / fraction.min(1.0)) - elapsed).max(0.0)
    }

    /// Convert microseconds to seconds.
    pub fn us_to_secs(us: u64) -> f64 {
        us as f64 / 1_000_000.0
    }
}

/// Rate limiter for progress callbacks.
#[derive(Debug)]
pub struct ProgressThrottle {
    min_interval_ms: u128,
    last_tick_ms: Option<u128>,
}

impl ProgressThrottle {
    /// Create a throttle allowing at most `max_hz` ticks per second.
    pub fn new(max_hz: u32) -> Self {
        Self {
            min_interval_ms: 1000 / max_hz.max(1) as u128,
            last_tick_ms: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ms: u128) -> bool {
        match self.last_tick_ms {
            None => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            Some(last) if current_ms >= last + self.min_interval_ms => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            _ => false,
        }
    }
}
