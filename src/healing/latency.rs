//! Bounded response-time ring buffer.
//!
//! Observability only: nothing in routing or eligibility reads these numbers.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sliding window of the most recent request durations.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone)]
pub struct ResponseTimes {
    samples_ms: VecDeque<f64>,
    capacity: usize,
    total: u64,
}

/// Aggregate statistics over the retained window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    /// Samples in the window.
    pub count: usize,
    /// Samples ever recorded.
    pub total_recorded: u64,
    /// Mean in milliseconds, `0.0` when empty.
    pub mean_ms: f64,
    /// Minimum in milliseconds.
    pub min_ms: f64,
    /// Maximum in milliseconds.
    pub max_ms: f64,
    /// Median in milliseconds.
    pub p50_ms: f64,
    /// 95th percentile in milliseconds.
    pub p95_ms: f64,
    /// 99th percentile in milliseconds.
    pub p99_ms: f64,
}

impl ResponseTimes {
    /// Create a window retaining at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples_ms: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            total: 0,
        }
    }

    /// Record one duration, dropping the oldest sample when full.
    pub fn record(&mut self, duration: Duration) {
        if self.samples_ms.len() >= self.capacity {
            self.samples_ms.pop_front();
        }
        self.samples_ms.push_back(duration.as_secs_f64() * 1000.0);
        self.total = self.total.saturating_add(1);
    }

    /// Compute window statistics. Percentiles use the nearest-rank method.
    pub fn stats(&self) -> ResponseTimeStats {
        if self.samples_ms.is_empty() {
            return ResponseTimeStats {
                total_recorded: self.total,
                ..ResponseTimeStats::default()
            };
        }
        let mut sorted: Vec<f64> = self.samples_ms.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let sum: f64 = sorted.iter().sum();
        ResponseTimeStats {
            count: sorted.len(),
            total_recorded: self.total,
            mean_ms: sum / sorted.len() as f64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}
