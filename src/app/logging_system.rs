use super::config::LogLevel;
use super::initialization::{InitializationError, LogDirective};
use parking_lot::RwLock;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Builds the global tracing filter from a default level plus per-target
/// directives. `RUST_LOG`, when set, wins over both.
pub struct LoggingSystem {
    directives: RwLock<Vec<LogDirective>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: RwLock::new(Vec::new()),
        }
    }

    /// Adds a directive. Malformed input is skipped with a warning on stderr
    /// since the subscriber is not up yet.
    pub fn add_directive(&self, directive_str: &str) -> Result<(), InitializationError> {
        match LogDirective::parse(directive_str) {
            Ok(directive) => {
                self.directives.write().push(directive);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                eprintln!("Warning: {e}, skipping directive");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().map(LogDirective::to_filter_string));
        filter_parts.join(",")
    }

    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), InitializationError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => {
                let filter_string = self.build_filter_string(default_level);
                EnvFilter::try_new(&filter_string).map_err(|e| {
                    InitializationError::LoggingInitFailed {
                        details: format!("Failed to create EnvFilter with '{filter_string}'"),
                        source: Box::new(e),
                    }
                })?
            }
        };

        // stderr keeps the REPL prompt and reports on stdout readable.
        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .compact(),
        );

        tracing::subscriber::set_global_default(subscriber).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: "Failed to set global tracing subscriber".to_string(),
                source: Box::new(e),
            }
        })
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber once per process. Later calls return the
/// outcome of the first.
pub fn setup_logging_safe(
    level: LogLevel,
    directives: &[String],
) -> Result<(), InitializationError> {
    static INIT_RESULT: OnceLock<Result<(), String>> = OnceLock::new();

    let outcome = INIT_RESULT.get_or_init(|| {
        let logging_system = LoggingSystem::new();
        for directive in directives {
            logging_system
                .add_directive(directive)
                .map_err(|e| e.to_string())?;
        }
        logging_system
            .initialize_tracing(level)
            .map_err(|e| e.to_string())
    });

    outcome
        .clone()
        .map_err(|details| InitializationError::LoggingInitFailed {
            details,
            source: Box::new(std::io::Error::other("Logging initialization error")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_directives() {
        let logging_system = LoggingSystem::new();
        assert!(logging_system.add_directive("calc_queue=debug").is_ok());
        assert!(logging_system.add_directive("not-a-directive").is_ok());
        assert!(logging_system.add_directive("=trace").is_ok());
        assert_eq!(logging_system.directive_count(), 1);
    }

    #[test]
    fn test_build_filter_string() {
        let logging_system = LoggingSystem::new();
        assert_eq!(logging_system.build_filter_string(LogLevel::Info), "info");

        logging_system.add_directive("calc_queue::buffer=warn").unwrap();
        assert_eq!(
            logging_system.build_filter_string(LogLevel::Debug),
            "debug,calc_queue::buffer=warn"
        );
    }

    #[test]
    fn test_concurrent_directive_modification() {
        let logging_system = Arc::new(LoggingSystem::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let logging_system = logging_system.clone();
                thread::spawn(move || {
                    logging_system
                        .add_directive(&format!("target{i}=info"))
                        .unwrap();
                    logging_system.build_filter_string(LogLevel::Info)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert_eq!(logging_system.directive_count(), 32);
    }

    #[test]
    fn test_setup_logging_safe_is_repeatable() {
        // Another test binary component may have installed a subscriber
        // first; either way repeated calls must agree.
        let first = setup_logging_safe(LogLevel::Info, &[]).is_ok();
        let second = setup_logging_safe(LogLevel::Debug, &[]).is_ok();
        assert_eq!(first, second);
    }
}
