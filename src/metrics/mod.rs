pub mod aggregator;
pub mod log;

pub use aggregator::{LatencyAggregator, LatencySnapshot, UNSET_MIN_LATENCY};
pub use log::BoundedLog;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default cap for both the result log and the latency log.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1_000_000;

/// Everything the worker records: the latency aggregator, the bounded
/// result/latency logs and a few counters.
///
/// The worker is the only writer. The logs sit behind a `Mutex` purely so
/// readers can copy them out; the lock is never contended by another writer.
#[derive(Debug)]
pub struct MetricsRecorder {
    aggregator: LatencyAggregator,
    results: Mutex<BoundedLog<f64>>,
    latencies: Mutex<BoundedLog<u64>>,
    evaluation_failures: AtomicU64,
    consumed: AtomicU64,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES)
    }
}

impl MetricsRecorder {
    pub fn new(max_log_entries: usize) -> Self {
        Self {
            aggregator: LatencyAggregator::new(),
            results: Mutex::new(BoundedLog::new(max_log_entries)),
            latencies: Mutex::new(BoundedLog::new(max_log_entries)),
            evaluation_failures: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, value: f64, latency_nanos: u64) {
        self.results.lock().push(value);
        self.aggregator.record_sample(latency_nanos);
        self.latencies.lock().push(latency_nanos);
    }

    pub fn record_failure(&self) {
        self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Called by the worker after each message has been fully handled.
    /// The Release pairs with [`consumed`](Self::consumed) so a reader that
    /// sees the count also sees the statistics recorded before it.
    pub fn mark_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Release);
    }

    /// Messages taken off the channel since construction, whatever their
    /// outcome. Not affected by [`reset_and_clear`](Self::reset_and_clear).
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    pub fn aggregator(&self) -> &LatencyAggregator {
        &self.aggregator
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.aggregator.snapshot();
        let (results_logged, results_dropped) = {
            let log = self.results.lock();
            (log.len(), log.dropped())
        };

        MetricsSnapshot {
            processed_count: latency.processed_count,
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            total_latency_nanos: latency.total_latency_nanos,
            average_latency_nanos: latency.average_latency_nanos(),
            min_latency_nanos: latency.min(),
            max_latency_nanos: latency.max(),
            results_logged,
            results_dropped,
        }
    }

    pub fn results(&self) -> Vec<f64> {
        self.results.lock().as_slice().to_vec()
    }

    pub fn latencies(&self) -> Vec<u64> {
        self.latencies.lock().as_slice().to_vec()
    }

    /// Zero every statistic and truncate both logs.
    pub fn reset_and_clear(&self) {
        self.results.lock().clear();
        self.latencies.lock().clear();
        self.aggregator.reset();
        self.evaluation_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the recorder, with "n/a" latencies as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub processed_count: u64,
    pub evaluation_failures: u64,
    pub total_latency_nanos: u64,
    pub average_latency_nanos: Option<f64>,
    pub min_latency_nanos: Option<u64>,
    pub max_latency_nanos: Option<u64>,
    pub results_logged: usize,
    pub results_dropped: u64,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.processed_count == 0
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(avg), Some(min), Some(max)) = (
            self.average_latency_nanos,
            self.min_latency_nanos,
            self.max_latency_nanos,
        ) else {
            return write!(f, "No commands processed yet.");
        };

        writeln!(f, "Performance Metrics:")?;
        writeln!(f, "Total commands processed: {}", self.processed_count)?;
        writeln!(f, "Evaluation failures: {}", self.evaluation_failures)?;
        writeln!(f, "Average latency: {avg:.2} ns")?;
        writeln!(f, "Min latency: {min} ns")?;
        write!(f, "Max latency: {max} ns")
    }
}
