//! Domain layer for calc-queue.
//!
//! Contains the canonical types shared across all modules:
//! - `Command`: the value copied through the channel
//! - `Operator`: the arithmetic operation a command requests
//! - `EvaluationError`: failures reported by the evaluator
//! - `evaluate` / `calculate`: the pure arithmetic collaborator

pub mod command;
pub mod error;
pub mod evaluator;

pub use command::{Command, Operator};
pub use error::EvaluationError;
pub use evaluator::{MAX_FACTORIAL_INPUT, calculate, evaluate, factorial};
