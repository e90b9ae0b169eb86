//! Run counters and latency statistics.
//!
//! Counters are plain atomics so the per-request hot path never takes a lock;
//! the raw latency samples live behind a mutex touched once per completed
//! request and once per reporting tick. Derived statistics (mean, percentiles)
//! are computed on demand from the raw data rather than maintained
//! incrementally: the stored state is totals and samples, nothing precomputed
//! that could drift.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// High-water mark for retained latency samples. Percentiles keep all raw
/// samples for fidelity; past this cap new samples are discarded while the
/// counters keep counting, so memory stays bounded on very long runs.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Point-in-time copy of the request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    /// Launch attempts shed by backpressure (no free worker slot).
    pub dropped: u64,
}

/// Sort-based latency summary over every sample collected so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Final, serializable summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub counters: Counters,
    pub error_rate: f64,
    pub latency: Option<LatencySummary>,
    pub elapsed: Duration,
}

/// Mutable metric state owned by exactly one simulation.
#[derive(Debug, Default)]
pub struct RunMetrics {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    samples: Mutex<Vec<f64>>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly one of `record_success`/`record_failure` runs per completed
    /// request, each bumping `total` once and appending one sample.
    pub fn record_success(&self, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.success.fetch_add(1, Ordering::Relaxed);
        self.push_sample(latency);
    }

    pub fn record_failure(&self, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.push_sample(latency);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn push_sample(&self, latency: Duration) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if samples.len() < MAX_SAMPLES {
            samples.push(latency.as_secs_f64() * 1000.0);
        }
    }

    pub fn counters(&self) -> Counters {
        Counters {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// failed / total * 100; zero while nothing has completed.
    pub fn error_rate(&self) -> f64 {
        let c = self.counters();
        if c.total == 0 {
            0.0
        } else {
            c.failed as f64 / c.total as f64 * 100.0
        }
    }

    /// Mean over all samples collected so far.
    pub fn mean_ms(&self) -> f64 {
        let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        }
    }

    /// Full sort-based percentile pass. O(n log n) per call, accepted for
    /// bounded-window testing scenarios.
    pub fn latency_summary(&self) -> Option<LatencySummary> {
        let mut sorted = {
            let samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
            if samples.is_empty() {
                return None;
            }
            samples.clone()
        };
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        Some(LatencySummary {
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            mean_ms: mean,
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        })
    }
}

/// Nearest-rank percentile over an already sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_conserve_total() {
        let m = RunMetrics::new();
        for i in 0..1000u64 {
            if i % 3 == 0 {
                m.record_failure(Duration::from_millis(5));
            } else {
                m.record_success(Duration::from_millis(5));
            }
        }
        let c = m.counters();
        assert_eq!(c.total, 1000);
        assert_eq!(c.total, c.success + c.failed);
    }

    #[test]
    fn conservation_under_concurrent_recording() {
        use std::sync::Arc;
        let m = Arc::new(RunMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for i in 0..5_000u64 {
                        if (t + i) % 2 == 0 {
                            m.record_success(Duration::from_millis(1));
                        } else {
                            m.record_failure(Duration::from_millis(1));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let c = m.counters();
        assert_eq!(c.total, 40_000);
        assert_eq!(c.total, c.success + c.failed);
    }

    #[test]
    fn error_rate_is_zero_without_traffic() {
        let m = RunMetrics::new();
        assert_eq!(m.error_rate(), 0.0);
        m.record_failure(Duration::from_millis(1));
        assert_eq!(m.error_rate(), 100.0);
        m.record_success(Duration::from_millis(1));
        assert_eq!(m.error_rate(), 50.0);
    }

    #[test]
    fn percentiles_over_known_distribution() {
        let m = RunMetrics::new();
        // 1ms..=100ms, one sample each.
        for ms in 1..=100u64 {
            m.record_success(Duration::from_millis(ms));
        }
        let s = m.latency_summary().unwrap();
        assert_eq!(s.min_ms, 1.0);
        assert_eq!(s.max_ms, 100.0);
        assert!((s.mean_ms - 50.5).abs() < 1e-9);
        assert!((s.p50_ms - 51.0).abs() <= 1.0);
        assert!((s.p95_ms - 95.0).abs() <= 1.0);
        assert!((s.p99_ms - 99.0).abs() <= 1.0);
    }

    #[test]
    fn empty_summary_is_none() {
        assert!(RunMetrics::new().latency_summary().is_none());
    }
}
