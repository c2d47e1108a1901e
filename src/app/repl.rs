//! Line-oriented interactive front end.
//!
//! Accepted lines:
//! - `q` quits
//! - `p` or `p N` runs the performance test (`N` defaults to one million)
//! - `A op B` with `op` one of `+ - * /`, or `A !`; spaces are optional

use super::bench::{DEFAULT_BENCH_OPERATIONS, run_performance_test};
use crate::queue::CommandQueue;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const PROMPT: &str = "Enter command (q/p/calculation): ";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplCommand {
    Empty,
    Quit,
    Performance(usize),
    Calculate { operand_a: f64, operand_b: f64, symbol: char },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplError {
    #[error("Number of operations must be positive")]
    NonPositiveOperations,
    #[error("Invalid input: missing operator in '{0}'")]
    MissingOperator(String),
    #[error("Invalid input: '{0}' is not a number")]
    InvalidNumber(String),
    #[error("Invalid input: unexpected '{0}' after '!'")]
    TrailingInput(String),
}

pub fn parse_line(line: &str) -> Result<ReplCommand, ReplError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }
    if line == "q" {
        return Ok(ReplCommand::Quit);
    }
    if let Some(rest) = line.strip_prefix('p') {
        return parse_performance(rest);
    }
    parse_calculation(line)
}

fn parse_performance(rest: &str) -> Result<ReplCommand, ReplError> {
    // A missing or non-numeric count falls back to the default.
    let Some(count) = rest.split_whitespace().next().and_then(|s| s.parse::<i64>().ok()) else {
        return Ok(ReplCommand::Performance(DEFAULT_BENCH_OPERATIONS));
    };
    if count <= 0 {
        return Err(ReplError::NonPositiveOperations);
    }
    Ok(ReplCommand::Performance(count as usize))
}

fn parse_calculation(line: &str) -> Result<ReplCommand, ReplError> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let chars: Vec<(usize, char)> = compact.char_indices().collect();

    // The operator is the first symbol that directly follows a digit, so a
    // leading sign and exponent signs stay part of their operand.
    let split = chars.windows(2).find_map(|pair| {
        let (_, prev) = pair[0];
        let (idx, c) = pair[1];
        let follows_number = prev.is_ascii_digit() || prev == '.';
        let is_numeric = c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E');
        (follows_number && !is_numeric).then_some((idx, c))
    });
    let Some((idx, symbol)) = split else {
        return Err(ReplError::MissingOperator(line.to_string()));
    };

    let operand_a = parse_operand(&compact[..idx])?;
    let rest = &compact[idx + symbol.len_utf8()..];

    let operand_b = if symbol == '!' {
        if !rest.is_empty() {
            return Err(ReplError::TrailingInput(rest.to_string()));
        }
        0.0
    } else {
        parse_operand(rest)?
    };

    Ok(ReplCommand::Calculate {
        operand_a,
        operand_b,
        symbol,
    })
}

fn parse_operand(text: &str) -> Result<f64, ReplError> {
    text.parse::<f64>()
        .map_err(|_| ReplError::InvalidNumber(text.to_string()))
}

/// Runs the read-eval loop until `q` or end of input. Normal output goes to
/// `out`, diagnostics to `err`.
pub fn run_repl<R, W, E>(
    queue: &CommandQueue,
    input: R,
    out: &mut W,
    err: &mut E,
    drain_timeout: Duration,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    writeln!(out, "Calculator Queue System")?;
    writeln!(
        out,
        "Enter 'q' to quit, 'p' for performance test, or enter calculations"
    )?;
    writeln!(
        out,
        "For performance test, enter 'p' followed by number of operations (e.g., 'p 1000000')"
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "\n{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            debug!("End of input, leaving interactive mode");
            return Ok(());
        };
        let line = line?;

        match parse_line(&line) {
            Ok(ReplCommand::Empty) => {}
            Ok(ReplCommand::Quit) => return Ok(()),
            Ok(ReplCommand::Performance(operations)) => {
                writeln!(
                    out,
                    "\nRunning performance test with {operations} operations..."
                )?;
                match run_performance_test(queue, operations, drain_timeout) {
                    Ok(report) => writeln!(out, "\n{report}")?,
                    Err(e) => writeln!(err, "Performance test failed: {e}")?,
                }
            }
            Ok(ReplCommand::Calculate {
                operand_a,
                operand_b,
                symbol,
            }) => match queue.submit(operand_a, operand_b, symbol) {
                Ok(()) => writeln!(out, "Command submitted to queue")?,
                Err(e) => writeln!(err, "Invalid input: {e}")?,
            },
            Err(e) => writeln!(err, "{e}")?,
        }
    }
}
