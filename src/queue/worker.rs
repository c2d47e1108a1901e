//! The single consumer thread.
//!
//! ```text
//!            drain read 0            notify / timeout
//! Draining ───────────────→ IdleWait ───────────────→ Draining
//!    │                                                   │
//!    └──────────── stop flag set ───────────→ Stopped ←──┘
//! ```
//!
//! On the stop flag the worker finishes the drain in progress, keeps draining
//! until the channel reads empty, and exits without waiting again.

use crate::buffer::{ChannelConsumer, CodecError};
use crate::domain::{Command, evaluate};
use crate::metrics::MetricsRecorder;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering, fence};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Draining = 0,
    IdleWait = 1,
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Draining,
            1 => WorkerState::IdleWait,
            _ => WorkerState::Stopped,
        }
    }
}

/// State shared between the facade (and its producers) and the worker.
#[derive(Debug)]
pub struct WorkerSignal {
    running: AtomicBool,
    state: AtomicU8,
    lock: Mutex<()>,
    wakeup: Condvar,
}

impl Default for WorkerSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            state: AtomicU8::new(WorkerState::Draining as u8),
            lock: Mutex::new(()),
            wakeup: Condvar::new(),
        }
    }

    /// Wake the worker if it is idle. Producers call this after every write.
    ///
    /// The worker publishes `IdleWait` before its last emptiness check and
    /// this side publishes the write before reading the state, with a SeqCst
    /// fence on both sides, so at least one of them sees the other. When the
    /// worker is idle the lock is taken, which orders the notify after the
    /// worker has actually started waiting.
    #[inline]
    pub fn notify(&self) {
        fence(Ordering::SeqCst);
        if self.state() == WorkerState::IdleWait {
            let _guard = self.lock.lock();
            self.wakeup.notify_one();
        }
    }

    /// Set the stop flag and wake the worker.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.wakeup.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

pub struct CommandWorker {
    consumer: ChannelConsumer,
    recorder: Arc<MetricsRecorder>,
    signal: Arc<WorkerSignal>,
    idle_timeout: Duration,
}

impl CommandWorker {
    pub fn new(
        consumer: ChannelConsumer,
        recorder: Arc<MetricsRecorder>,
        signal: Arc<WorkerSignal>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            consumer,
            recorder,
            signal,
            idle_timeout,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("calc-queue-worker".to_string())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        info!(
            capacity = self.consumer.capacity(),
            idle_timeout_ms = self.idle_timeout.as_millis() as u64,
            "Command worker started"
        );

        while self.signal.is_running() {
            self.signal.set_state(WorkerState::Draining);
            if self.drain_once() == 0 {
                self.idle_wait();
            }
        }

        // Stop requested: flush whatever was accepted before it.
        let mut flushed = 0;
        loop {
            let read = self.drain_once();
            if read == 0 {
                break;
            }
            flushed += read;
        }

        self.signal.set_state(WorkerState::Stopped);
        info!(flushed, "Command worker stopped");
    }

    /// One pass over the channel. Returns the number of messages read.
    pub fn drain_once(&mut self) -> usize {
        let recorder = &self.recorder;
        self.consumer
            .drain(|decoded| process_message(recorder, decoded))
    }

    fn idle_wait(&self) {
        let mut guard = self.signal.lock.lock();
        self.signal.set_state(WorkerState::IdleWait);
        fence(Ordering::SeqCst);
        // Re-check under the lock: stop() and idle-time notifies hold it.
        if !self.signal.is_running() || !self.consumer.is_empty() {
            return;
        }
        let _ = self.signal.wakeup.wait_for(&mut guard, self.idle_timeout);
    }
}

fn process_message(recorder: &MetricsRecorder, decoded: Result<Command, CodecError>) {
    match decoded {
        Ok(command) => {
            let start = Instant::now();
            let outcome = evaluate(&command);
            let latency_nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

            match outcome {
                Ok(value) => {
                    debug!(%command, value, latency_nanos, "Command evaluated");
                    recorder.record_success(value, latency_nanos);
                }
                Err(e) => {
                    warn!(%command, error = %e, "Error processing command");
                    recorder.record_failure();
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Discarding undecodable channel frame");
            recorder.record_failure();
        }
    }
    recorder.mark_consumed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::bounded;
    use crate::domain::{Command, Operator};

    fn worker(capacity: usize) -> (crate::buffer::ChannelProducer, CommandWorker, Arc<MetricsRecorder>) {
        let (tx, rx) = bounded(capacity).unwrap();
        let recorder = Arc::new(MetricsRecorder::new(100));
        let worker = CommandWorker::new(
            rx,
            recorder.clone(),
            Arc::new(WorkerSignal::new()),
            Duration::from_millis(10),
        );
        (tx, worker, recorder)
    }

    #[test]
    fn test_drain_once_records_successes_and_failures() {
        let (tx, mut worker, recorder) = worker(8);
        tx.try_write(&Command::new(2.0, 3.0, Operator::Add));
        tx.try_write(&Command::new(10.0, 0.0, Operator::Div));
        tx.try_write(&Command::new(5.0, 0.0, Operator::Factorial));

        assert_eq!(worker.drain_once(), 3);

        let snap = recorder.snapshot();
        assert_eq!(snap.processed_count, 2);
        assert_eq!(snap.evaluation_failures, 1);
        assert_eq!(recorder.results(), vec![5.0, 120.0]);
        assert_eq!(recorder.consumed(), 3);
    }

    #[test]
    fn test_undecodable_message_counts_as_consumed_failure() {
        let recorder = MetricsRecorder::new(10);
        process_message(&recorder, Err(CodecError::UnknownOperator(b'%')));

        let snap = recorder.snapshot();
        assert_eq!(snap.processed_count, 0);
        assert_eq!(snap.evaluation_failures, 1);
        assert_eq!(recorder.consumed(), 1);
    }

    #[test]
    fn test_notify_wakes_idle_worker_before_timeout() {
        let (tx, rx) = bounded(8).unwrap();
        let recorder = Arc::new(MetricsRecorder::new(1000));
        let signal = Arc::new(WorkerSignal::new());
        // An idle timeout far longer than the per-command deadline below, so
        // a missed wakeup fails the test instead of being papered over.
        let handle = CommandWorker::new(
            rx,
            recorder.clone(),
            signal.clone(),
            Duration::from_secs(60),
        )
        .spawn()
        .unwrap();

        for i in 0..200u64 {
            assert!(tx.try_write(&Command::new(i as f64, 1.0, Operator::Add)));
            signal.notify();

            let deadline = Instant::now() + Duration::from_secs(5);
            while recorder.consumed() < i + 1 {
                assert!(Instant::now() < deadline, "command {i} not woken");
                thread::yield_now();
            }
        }

        signal.stop();
        handle.join().unwrap();
        assert_eq!(recorder.snapshot().processed_count, 200);
    }

    #[test]
    fn test_stop_flushes_pending_commands() {
        let (tx, worker, recorder) = worker(16);
        let signal = worker.signal.clone();
        for i in 0..10 {
            assert!(tx.try_write(&Command::new(i as f64, 1.0, Operator::Mul)));
        }

        signal.stop();
        let handle = worker.spawn().unwrap();
        handle.join().unwrap();

        assert_eq!(signal.state(), WorkerState::Stopped);
        assert_eq!(recorder.snapshot().processed_count, 10);
    }

    #[test]
    fn test_worker_goes_idle_when_empty() {
        let (_tx, worker, _recorder) = worker(4);
        let signal = worker.signal.clone();
        let handle = worker.spawn().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while signal.state() != WorkerState::IdleWait && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(signal.state(), WorkerState::IdleWait);

        signal.stop();
        handle.join().unwrap();
        assert_eq!(signal.state(), WorkerState::Stopped);
    }
}
