use super::{ConfigError, LogLevel};
use crate::metrics::DEFAULT_MAX_LOG_ENTRIES;
use crate::queue::{DEFAULT_CHANNEL_CAPACITY, QueueConfig};
use clap::Parser;
use clap::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Number of channel slots (power of two, at least 2)
    #[arg(long, env = "CHANNEL_CAPACITY", default_value = "1024")]
    pub channel_capacity: usize,

    /// Longest the worker sleeps when idle, in milliseconds
    #[arg(long, env = "IDLE_TIMEOUT_MS", default_value = "100")]
    pub idle_timeout_ms: u64,

    /// Cap for the result and latency logs
    #[arg(long, env = "MAX_LOG_ENTRIES", default_value = "1000000")]
    pub max_log_entries: usize,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Extra tracing directives, e.g. `calc_queue::queue::worker=debug`
    #[arg(long = "log-directive", env = "LOG_DIRECTIVES", value_delimiter = ',')]
    pub log_directives: Vec<String>,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Run the performance test with this many operations and exit
    #[arg(long, env = "BENCH_OPERATIONS")]
    pub bench: Option<usize>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            idle_timeout_ms: 100,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            log_level: LogLevel::Info,
            log_directives: Vec::new(),
            config_file: None,
            bench: None,
            idle_timeout: Duration::from_millis(100),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = match Config::try_parse_from(args) {
            Ok(config) => config,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => return Err(ConfigError::InvalidConfig(e.to_string())),
        };
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse CLI args and, when `--config-file` is given, load that file
    /// instead. The run mode (`--bench`) always comes from the command line.
    pub fn from_args_and_file<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Self::from_args(args)?;
        let Some(path) = cli.config_file.clone() else {
            return Ok(cli);
        };

        let mut config = Self::from_file(&path)?;
        config.config_file = Some(path);
        if cli.bench.is_some() {
            config.bench = cli.bench;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        // Convert milliseconds to Duration
        self.idle_timeout = Duration::from_millis(self.idle_timeout_ms);
        Ok(())
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            channel_capacity: self.channel_capacity,
            idle_timeout: self.idle_timeout,
            max_log_entries: self.max_log_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_args() {
        let config = Config::from_args(["calc-queue"]).unwrap();
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.idle_timeout, Duration::from_millis(100));
        assert_eq!(config.max_log_entries, 1_000_000);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.bench, None);
        assert_eq!(config.queue_config(), QueueConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::from_args([
            "calc-queue",
            "--channel-capacity",
            "64",
            "--idle-timeout-ms",
            "5",
            "--log-level",
            "debug",
            "--log-directive",
            "calc_queue=trace,calc_queue::buffer=warn",
            "--bench",
            "500",
        ])
        .unwrap();

        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.idle_timeout, Duration::from_millis(5));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_directives.len(), 2);
        assert_eq!(config.bench, Some(500));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("channel_capacity = 256\nlog_level = \"warn\"\n").unwrap();
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.idle_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        assert!(matches!(
            Config::from_toml_str("channel_capacity = \"lots\""),
            Err(ConfigError::ParseError(_))
        ));
    }
}
