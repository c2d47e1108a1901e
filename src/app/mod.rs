pub mod bench;
pub mod config;
pub mod initialization;
pub mod logging_system;
pub mod repl;

pub use bench::{DEFAULT_BENCH_OPERATIONS, PerformanceReport, run_performance_test};
pub use config::{Config, ConfigError, LogLevel};
pub use initialization::{InitializationError, LogDirective};
pub use logging_system::{LoggingSystem, setup_logging_safe};
pub use repl::{ReplCommand, ReplError, parse_line, run_repl};

use crate::queue::CommandQueue;
use anyhow::Context;
use std::io;
use std::time::Duration;
use tracing::info;

/// How long a performance run waits for the worker to catch up.
const BENCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(300);

pub struct App {
    config: Config,
    queue: CommandQueue,
}

impl App {
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args_and_file(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        setup_logging_safe(config.log_level, &config.log_directives)?;

        info!("Starting calc-queue v{}", env!("CARGO_PKG_VERSION"));
        if let Some(path) = &config.config_file {
            info!("Configuration loaded from {}", path.display());
        }
        info!(
            channel_capacity = config.channel_capacity,
            idle_timeout_ms = config.idle_timeout_ms,
            max_log_entries = config.max_log_entries,
            "Configuration"
        );

        let queue = CommandQueue::new(config.queue_config())
            .context("failed to start command queue")?;

        Ok(Self { config, queue })
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// `--bench N` runs one performance test and exits; otherwise the REPL
    /// reads stdin until `q` or EOF.
    pub fn run(self) -> anyhow::Result<()> {
        if let Some(operations) = self.config.bench {
            let report = run_performance_test(&self.queue, operations, BENCH_DRAIN_TIMEOUT)?;
            println!("{report}");
        } else {
            let stdin = io::stdin();
            let stdout = io::stdout();
            let stderr = io::stderr();
            run_repl(
                &self.queue,
                stdin.lock(),
                &mut stdout.lock(),
                &mut stderr.lock(),
                BENCH_DRAIN_TIMEOUT,
            )
            .context("interactive session failed")?;
        }

        let final_metrics = self.queue.shutdown()?;
        info!(
            processed = final_metrics.processed_count,
            evaluation_failures = final_metrics.evaluation_failures,
            "calc-queue stopped"
        );
        Ok(())
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub fn main() -> anyhow::Result<()> {
    let app = App::from_args(std::env::args_os())?;
    app.run()
}
