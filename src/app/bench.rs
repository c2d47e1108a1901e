use crate::domain::Operator;
use crate::metrics::MetricsSnapshot;
use crate::queue::{CommandQueue, QueueError};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_BENCH_OPERATIONS: usize = 1_000_000;

const BENCH_OPERATORS: [Operator; 4] = [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div];

#[derive(Debug, Clone)]
pub struct PerformanceReport {
    pub operations: usize,
    /// Submission plus drain, measured from the first submit.
    pub elapsed: Duration,
    /// False when the worker did not catch up before the drain timeout.
    pub drained: bool,
    pub metrics: MetricsSnapshot,
}

impl PerformanceReport {
    pub fn average_nanos_per_operation(&self) -> f64 {
        if self.operations == 0 {
            return 0.0;
        }
        self.elapsed.as_nanos() as f64 / self.operations as f64
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test completed in {} ns", self.elapsed.as_nanos())?;
        writeln!(
            f,
            "Average time per operation: {:.2} ns",
            self.average_nanos_per_operation()
        )?;
        if !self.drained {
            writeln!(f, "Warning: worker had not drained the queue when measured")?;
        }
        write!(f, "{}", self.metrics)
    }
}

/// The `i`-th command of the synthetic workload.
pub fn workload_command(i: usize) -> (f64, f64, Operator) {
    let operand_a = (i + 1) as f64;
    let operand_b = ((i % 10) + 1) as f64;
    (operand_a, operand_b, BENCH_OPERATORS[i % BENCH_OPERATORS.len()])
}

/// Submit `operations` commands, wait for the worker to drain them, then
/// collect (and reset) the metrics.
pub fn run_performance_test(
    queue: &CommandQueue,
    operations: usize,
    drain_timeout: Duration,
) -> Result<PerformanceReport, QueueError> {
    info!(operations, "Running performance test");

    let start = Instant::now();
    for i in 0..operations {
        let (operand_a, operand_b, operator) = workload_command(i);
        queue.submit(operand_a, operand_b, operator.symbol())?;
    }
    let drained = queue.wait_for_idle(drain_timeout);
    let elapsed = start.elapsed();

    if !drained {
        warn!(
            pending = queue.stats().pending(),
            "Performance test timed out waiting for the worker"
        );
    }

    let metrics = queue.collect_metrics();
    info!(
        operations,
        elapsed_ms = elapsed.as_millis() as u64,
        processed = metrics.processed_count,
        "Performance test finished"
    );

    Ok(PerformanceReport {
        operations,
        elapsed,
        drained,
        metrics,
    })
}
