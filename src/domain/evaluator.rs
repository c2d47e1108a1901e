use super::command::{Command, Operator};
use super::error::EvaluationError;

/// 21! does not fit in a u64.
pub const MAX_FACTORIAL_INPUT: i64 = 20;

/// Evaluates a command. Pure and stateless.
pub fn evaluate(command: &Command) -> Result<f64, EvaluationError> {
    apply(command.operator, command.operand_a, command.operand_b)
}

/// Evaluates a raw operator symbol, reporting unknown symbols as
/// [`EvaluationError::InvalidOperator`].
pub fn calculate(operand_a: f64, operand_b: f64, symbol: char) -> Result<f64, EvaluationError> {
    let operator = Operator::from_symbol(symbol).ok_or(EvaluationError::InvalidOperator(symbol))?;
    apply(operator, operand_a, operand_b)
}

fn apply(operator: Operator, a: f64, b: f64) -> Result<f64, EvaluationError> {
    match operator {
        Operator::Add => Ok(a + b),
        Operator::Sub => Ok(a - b),
        Operator::Mul => Ok(a * b),
        Operator::Div => {
            if b == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            Ok(a / b)
        }
        // Operand A is truncated toward zero; operand B is ignored.
        Operator::Factorial => factorial(a as i64).map(|n| n as f64),
    }
}

pub fn factorial(n: i64) -> Result<u64, EvaluationError> {
    if n < 0 {
        return Err(EvaluationError::NegativeFactorialInput(n));
    }
    if n > MAX_FACTORIAL_INPUT {
        return Err(EvaluationError::FactorialOverflow(n));
    }
    Ok((2..=n as u64).product())
}
