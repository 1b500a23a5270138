//! Time utilities for the client tick loop

use std::time::{Duration, Instant};

/// Client start time for uptime tracking
static CLIENT_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize client start time (call once at startup)
pub fn init_client_time() {
    CLIENT_START.get_or_init(Instant::now);
}

/// Get client uptime in seconds
pub fn uptime_secs() -> u64 {
    CLIENT_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Duration of one tick at the given rate
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.max(1) as u64)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
