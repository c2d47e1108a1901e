use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic operator carried by a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Factorial,
}

impl Operator {
    pub const ALL: [Operator; 5] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Factorial,
    ];

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '!' => Some(Operator::Factorial),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Factorial => '!',
        }
    }

    /// Unary operators ignore operand B.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Factorial)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single arithmetic request.
///
/// Commands are plain values: every enqueue copies one into a channel slot and
/// the worker copies it back out, so there is never shared ownership.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub operand_a: f64,
    pub operand_b: f64,
    pub operator: Operator,
    /// Wall-clock submission time, nanoseconds since the Unix epoch.
    pub submitted_at_nanos: u64,
}

impl Command {
    /// Builds a command stamped with the current wall-clock time.
    pub fn new(operand_a: f64, operand_b: f64, operator: Operator) -> Self {
        Self::with_timestamp(operand_a, operand_b, operator, now_nanos())
    }

    pub fn with_timestamp(
        operand_a: f64,
        operand_b: f64,
        operator: Operator,
        submitted_at_nanos: u64,
    ) -> Self {
        Self {
            operand_a,
            operand_b,
            operator,
            submitted_at_nanos,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator.is_unary() {
            write!(f, "{}{}", self.operand_a, self.operator)
        } else {
            write!(f, "{} {} {}", self.operand_a, self.operator, self.operand_b)
        }
    }
}

fn now_nanos() -> u64 {
    // Pre-1970 clocks and post-2262 dates fall back to 0.
    Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or_default()
}
