// Lock-free latency statistics using atomic operations
//
// Count and sum are plain fetch_add. Min and max use an optimistic
// compare-and-swap loop so a concurrent writer can never cause a lost update.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel held by `min_latency_nanos` before the first sample.
pub const UNSET_MIN_LATENCY: u64 = u64::MAX;

#[derive(Debug)]
pub struct LatencyAggregator {
    processed_count: AtomicU64,
    total_latency_nanos: AtomicU64,
    min_latency_nanos: AtomicU64,
    max_latency_nanos: AtomicU64,
}

impl Default for LatencyAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyAggregator {
    pub fn new() -> Self {
        Self {
            processed_count: AtomicU64::new(0),
            total_latency_nanos: AtomicU64::new(0),
            min_latency_nanos: AtomicU64::new(UNSET_MIN_LATENCY),
            max_latency_nanos: AtomicU64::new(0),
        }
    }

    /// Fold one latency sample into the running statistics.
    pub fn record_sample(&self, latency_nanos: u64) {
        self.processed_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_nanos
            .fetch_add(latency_nanos, Ordering::Relaxed);
        self.update_min(latency_nanos);
        self.update_max(latency_nanos);
    }

    fn update_min(&self, latency_nanos: u64) {
        let mut current = self.min_latency_nanos.load(Ordering::Relaxed);
        while latency_nanos < current {
            match self.min_latency_nanos.compare_exchange_weak(
                current,
                latency_nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn update_max(&self, latency_nanos: u64) {
        let mut current = self.max_latency_nanos.load(Ordering::Relaxed);
        while latency_nanos > current {
            match self.max_latency_nanos.compare_exchange_weak(
                current,
                latency_nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    /// Read the current state. Each field is loaded independently, so a
    /// snapshot taken while samples are arriving may be slightly stale.
    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            processed_count: self.processed_count.load(Ordering::Relaxed),
            total_latency_nanos: self.total_latency_nanos.load(Ordering::Relaxed),
            min_latency_nanos: self.min_latency_nanos.load(Ordering::Relaxed),
            max_latency_nanos: self.max_latency_nanos.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.processed_count.store(0, Ordering::Relaxed);
        self.total_latency_nanos.store(0, Ordering::Relaxed);
        self.min_latency_nanos
            .store(UNSET_MIN_LATENCY, Ordering::Relaxed);
        self.max_latency_nanos.store(0, Ordering::Relaxed);
    }
}

/// Raw aggregator state. `processed_count == 0` means "no statistics":
/// min then holds [`UNSET_MIN_LATENCY`] and max holds zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySnapshot {
    pub processed_count: u64,
    pub total_latency_nanos: u64,
    pub min_latency_nanos: u64,
    pub max_latency_nanos: u64,
}

impl LatencySnapshot {
    pub fn is_empty(&self) -> bool {
        self.processed_count == 0
    }

    pub fn average_latency_nanos(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.total_latency_nanos as f64 / self.processed_count as f64)
    }

    pub fn min(&self) -> Option<u64> {
        (!self.is_empty()).then_some(self.min_latency_nanos)
    }

    pub fn max(&self) -> Option<u64> {
        (!self.is_empty()).then_some(self.max_latency_nanos)
    }
}
