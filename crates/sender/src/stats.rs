//! Transfer throughput tracking
//!
//! Counts frames and bytes in fixed reporting windows so a looping sender can
//! log its frame rate and bandwidth once per interval.

use std::time::{Duration, Instant};

/// Default reporting window
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Counts for one finished reporting window (or a whole run)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    pub frames: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl StatsReport {
    /// Frames per second over the window
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Kilobytes (1000 bytes) per second over the window
    pub fn kbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / 1000.0 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct TransferStats {
    interval: Duration,
    started: Instant,
    window_start: Instant,
    window_frames: u64,
    window_bytes: u64,
    total_frames: u64,
    total_bytes: u64,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new(REPORT_INTERVAL)
    }
}

impl TransferStats {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            window_start: now,
            window_frames: 0,
            window_bytes: 0,
            total_frames: 0,
            total_bytes: 0,
        }
    }

    /// Record one sent frame; returns a report when the window has elapsed
    pub fn record(&mut self, bytes: usize) -> Option<StatsReport> {
        self.record_at(bytes, Instant::now())
    }

    fn record_at(&mut self, bytes: usize, now: Instant) -> Option<StatsReport> {
        self.window_frames += 1;
        self.window_bytes += bytes as u64;
        self.total_frames += 1;
        self.total_bytes += bytes as u64;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let report = StatsReport {
            frames: self.window_frames,
            bytes: self.window_bytes,
            elapsed,
        };
        self.window_start = now;
        self.window_frames = 0;
        self.window_bytes = 0;
        Some(report)
    }

    /// Totals since creation
    pub fn summary(&self) -> StatsReport {
        StatsReport {
            frames: self.total_frames,
            bytes: self.total_bytes,
            elapsed: self.started.elapsed(),
        }
    }
}
