//! Session statistics for the monitor loop.
//!
//! Tracks tick durations and gateway failures so that a summary can be logged
//! when a monitoring session ends.

use std::fmt::Write as FmtWrite;
use tracing::info;

/// Running statistics for a single metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

/// Counters kept for one monitoring session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Time spent in gateway calls plus aggregation, per tick, in milliseconds.
    pub tick_duration_ms: RunningStat,
    pub ticks: u64,
    pub policy_failures: u64,
    pub interface_failures: u64,
    /// Samples that resolved to no tier, summed over all ticks.
    pub unclassified_samples: u64,
}

impl SessionStats {
    /// Human-readable one-block summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "ticks: {}", self.ticks);
        let _ = writeln!(
            out,
            "tick duration ms: avg={:.1} min={:.1} max={:.1} last={:.1}",
            self.tick_duration_ms.avg(),
            self.tick_duration_ms.min(),
            self.tick_duration_ms.max(),
            self.tick_duration_ms.last()
        );
        let _ = writeln!(out, "policy query failures: {}", self.policy_failures);
        let _ = writeln!(out, "interface query failures: {}", self.interface_failures);
        let _ = write!(out, "unclassified samples: {}", self.unclassified_samples);
        out
    }

    pub fn log_summary(&self) {
        for line in self.summary().lines() {
            info!("session {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat() {
        let mut s = RunningStat::default();
        assert_eq!(s.avg(), 0.0);
        s.add(10.0);
        s.add(30.0);
        s.add(20.0);
        assert_eq!(s.count(), 3);
        assert_eq!(s.min(), 10.0);
        assert_eq!(s.max(), 30.0);
        assert_eq!(s.last(), 20.0);
        assert_eq!(s.avg(), 20.0);
    }

    #[test]
    fn test_summary_contains_counters() {
        let stats = SessionStats {
            ticks: 4,
            policy_failures: 1,
            ..Default::default()
        };
        let summary = stats.summary();
        assert!(summary.contains("ticks: 4"));
        assert!(summary.contains("policy query failures: 1"));
    }
}
