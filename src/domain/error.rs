use thiserror::Error;

/// Domain failures reported by the evaluator.
///
/// None of these stop the worker: the command is dropped, a diagnostic is
/// logged, and the sample is left out of the latency statistics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Factorial is not defined for negative numbers (got {0})")]
    NegativeFactorialInput(i64),

    #[error("Factorial result too large (max input: 20, got {0})")]
    FactorialOverflow(i64),

    #[error("Invalid operator '{0}'")]
    InvalidOperator(char),
}
