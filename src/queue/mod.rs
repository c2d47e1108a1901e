pub mod config;
pub mod error;
pub mod worker;

pub use config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_IDLE_TIMEOUT, QueueConfig};
pub use error::QueueError;
pub use worker::{CommandWorker, WorkerSignal, WorkerState};

use crate::buffer::{ChannelProducer, bounded};
use crate::domain::{Command, Operator};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Submission-side counters kept by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Commands written into the channel.
    pub accepted: u64,
    /// Commands taken off the channel by the worker, whatever their outcome.
    pub consumed: u64,
    /// Failed write attempts that had to yield because the channel was full.
    pub backpressure_retries: u64,
}

impl QueueStats {
    pub fn pending(&self) -> u64 {
        self.accepted.saturating_sub(self.consumed)
    }
}

/// Asynchronous calculator queue.
///
/// Owns the channel, the worker thread and the metrics recorder. Any number of
/// threads may [`submit`](Self::submit) through a shared reference; there is
/// no ordering guarantee between commands from different threads.
///
/// `submit` blocks (yield-and-retry, no timeout) while the channel is full.
/// This is deliberate backpressure: producers run at the worker's pace instead
/// of growing memory.
pub struct CommandQueue {
    producer: ChannelProducer,
    signal: Arc<WorkerSignal>,
    recorder: Arc<MetricsRecorder>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    accepted: AtomicU64,
    backpressure_retries: AtomicU64,
    config: QueueConfig,
}

impl CommandQueue {
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let (producer, consumer) = bounded(config.channel_capacity)?;
        let recorder = Arc::new(MetricsRecorder::new(config.max_log_entries));
        let signal = Arc::new(WorkerSignal::new());

        let handle = CommandWorker::new(
            consumer,
            recorder.clone(),
            signal.clone(),
            config.idle_timeout,
        )
        .spawn()
        .map_err(QueueError::WorkerSpawn)?;

        info!(
            channel_capacity = config.channel_capacity,
            max_log_entries = config.max_log_entries,
            "Command queue started"
        );

        Ok(Self {
            producer,
            signal,
            recorder,
            worker: Mutex::new(Some(handle)),
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
            backpressure_retries: AtomicU64::new(0),
            config,
        })
    }

    /// Queue `operand_a <symbol> operand_b`. Returns once queued, not once
    /// computed.
    pub fn submit(&self, operand_a: f64, operand_b: f64, symbol: char) -> Result<(), QueueError> {
        let operator = Operator::from_symbol(symbol).ok_or(QueueError::InvalidOperator(symbol))?;
        self.submit_command(Command::new(operand_a, operand_b, operator))
    }

    pub fn submit_command(&self, command: Command) -> Result<(), QueueError> {
        let _guard = InFlightGuard::enter(&self.in_flight);

        if !self.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::ShutdownInProgress);
        }

        while !self.producer.try_write(&command) {
            self.backpressure_retries.fetch_add(1, Ordering::Relaxed);
            thread::yield_now();
        }

        self.accepted.fetch_add(1, Ordering::Release);
        self.signal.notify();
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.recorder.snapshot()
    }

    /// Copy of the result log.
    pub fn results(&self) -> Vec<f64> {
        self.recorder.results()
    }

    /// Copy of the latency log, in nanoseconds.
    pub fn latencies(&self) -> Vec<u64> {
        self.recorder.latencies()
    }

    pub fn reset_and_clear(&self) {
        self.recorder.reset_and_clear();
    }

    /// Snapshot, then reset, so the next measurement window starts clean.
    pub fn collect_metrics(&self) -> MetricsSnapshot {
        let snapshot = self.recorder.snapshot();
        self.recorder.reset_and_clear();
        snapshot
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            accepted: self.accepted.load(Ordering::Acquire),
            consumed: self.recorder.consumed(),
            backpressure_retries: self.backpressure_retries.load(Ordering::Relaxed),
        }
    }

    pub fn worker_state(&self) -> WorkerState {
        self.signal.state()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Block until every accepted command has been consumed, or `timeout`
    /// passes. Returns whether the queue went idle.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.stats().pending() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
    }

    /// Stop accepting commands, let the worker flush what was accepted, join
    /// it, and clear all metrics.
    ///
    /// Returns the metrics as they stood after the join and before clearing.
    /// Safe to call more than once and from several threads at once: only one
    /// call joins the worker, the others block until it has finished and
    /// return an empty snapshot.
    pub fn shutdown(&self) -> Result<MetricsSnapshot, QueueError> {
        self.accepting.store(false, Ordering::SeqCst);

        // Submissions that passed the accepting check must land before the
        // worker's final drain.
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }

        self.signal.stop();

        // Held until the clear so a concurrent caller cannot return (or wipe
        // the recorder) while the worker is still flushing.
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            handle.join().map_err(|_| QueueError::WorkerPanicked)?;
            let stats = self.stats();
            info!(
                accepted = stats.accepted,
                consumed = stats.consumed,
                backpressure_retries = stats.backpressure_retries,
                "Command queue shut down"
            );
        }

        let final_snapshot = self.recorder.snapshot();
        self.recorder.reset_and_clear();
        drop(worker);
        Ok(final_snapshot)
    }

    pub fn is_shut_down(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Shutdown error: {}", e);
        }
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("worker_state", &self.worker_state())
            .finish()
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> CommandQueue {
        CommandQueue::new(QueueConfig {
            channel_capacity: 16,
            idle_timeout: Duration::from_millis(10),
            max_log_entries: 1000,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = CommandQueue::new(QueueConfig {
            channel_capacity: 3,
            ..Default::default()
        });
        assert!(matches!(result, Err(QueueError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_operator_rejected_at_submit() {
        let q = queue();
        assert!(matches!(
            q.submit(1.0, 2.0, '%'),
            Err(QueueError::InvalidOperator('%'))
        ));
        assert_eq!(q.stats().accepted, 0);
    }

    #[test]
    fn test_collect_metrics_resets() {
        let q = queue();
        q.submit(1.0, 1.0, '+').unwrap();
        assert!(q.wait_for_idle(Duration::from_secs(5)));

        let collected = q.collect_metrics();
        assert_eq!(collected.processed_count, 1);
        assert!(q.metrics_snapshot().is_empty());
        assert!(q.results().is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let q = queue();
        q.submit(2.0, 2.0, '*').unwrap();

        let first = q.shutdown().unwrap();
        assert_eq!(first.processed_count, 1);
        assert_eq!(q.worker_state(), WorkerState::Stopped);

        let second = q.shutdown().unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let q = queue();
        q.shutdown().unwrap();
        assert!(q.is_shut_down());
        assert!(matches!(
            q.submit(1.0, 1.0, '+'),
            Err(QueueError::ShutdownInProgress)
        ));
    }
}
