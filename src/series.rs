//! Bounded time-series storage for per-second run snapshots.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Hard cap on retained points. Memory stays O(capacity) no matter how long
/// a run lives; the oldest points are evicted first.
pub const SERIES_CAPACITY: usize = 10_000;

/// One per-second observation of a run. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Unix milliseconds.
    pub timestamp_ms: u64,
    /// Requests completed since the previous sample.
    pub observed_rps: u64,
    /// What the rate curve asked for at this sample.
    pub target_rps: f64,
    /// Mean over all samples collected so far, not just this interval.
    pub mean_response_ms: f64,
    /// failed / total * 100, zero while total is zero.
    pub error_rate: f64,
    /// Worker slots currently held by in-flight requests.
    pub active_workers: usize,
}

/// Ring buffer of [`TimeSeriesPoint`]s with FIFO eviction at capacity.
///
/// Only the reporting loop writes, so append order is strictly chronological.
#[derive(Debug)]
pub struct TimeSeriesBuffer {
    points: VecDeque<TimeSeriesPoint>,
    capacity: usize,
}

impl TimeSeriesBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SERIES_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, point: TimeSeriesPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points with `timestamp_ms >= since`, ascending. Linear scan; the
    /// buffer is small by construction.
    pub fn since(&self, since: u64) -> Vec<TimeSeriesPoint> {
        self.points
            .iter()
            .filter(|p| p.timestamp_ms >= since)
            .cloned()
            .collect()
    }

    /// The most recent `n` points, ascending.
    pub fn last(&self, n: usize) -> Vec<TimeSeriesPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }
}

impl Default for TimeSeriesBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ts: u64) -> TimeSeriesPoint {
        TimeSeriesPoint {
            timestamp_ms: ts,
            observed_rps: ts,
            target_rps: ts as f64,
            mean_response_ms: 0.0,
            error_rate: 0.0,
            active_workers: 0,
        }
    }

    #[test]
    fn evicts_oldest_first_at_capacity() {
        let mut buf = TimeSeriesBuffer::with_capacity(100);
        for ts in 0..250 {
            buf.push(point(ts));
        }
        assert_eq!(buf.len(), 100);
        // Content check: the survivors are exactly the newest 100, in order.
        let timestamps: Vec<u64> = buf.since(0).iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, (150..250).collect::<Vec<u64>>());
    }

    #[test]
    fn full_capacity_eviction() {
        let mut buf = TimeSeriesBuffer::new();
        for ts in 0..(SERIES_CAPACITY as u64 + 500) {
            buf.push(point(ts));
        }
        assert_eq!(buf.len(), SERIES_CAPACITY);
        assert_eq!(buf.since(0).first().unwrap().timestamp_ms, 500);
    }

    #[test]
    fn since_is_inclusive_and_ascending() {
        let mut buf = TimeSeriesBuffer::new();
        for ts in [10, 20, 30, 40] {
            buf.push(point(ts));
        }
        let got = buf.since(20);
        assert_eq!(
            got.iter().map(|p| p.timestamp_ms).collect::<Vec<_>>(),
            vec![20, 30, 40]
        );
    }

    #[test]
    fn last_n_points() {
        let mut buf = TimeSeriesBuffer::new();
        for ts in 0..10 {
            buf.push(point(ts));
        }
        let got = buf.last(3);
        assert_eq!(
            got.iter().map(|p| p.timestamp_ms).collect::<Vec<_>>(),
            vec![7, 8, 9]
        );
        assert_eq!(buf.last(100).len(), 10);
    }
}
