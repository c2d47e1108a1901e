use super::error::QueueError;
use crate::buffer::MIN_CAPACITY;
use crate::metrics::DEFAULT_MAX_LOG_ENTRIES;
use std::time::Duration;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Number of channel slots. Power of two, at least 2.
    pub channel_capacity: usize,
    /// Longest the worker sleeps before re-checking for work or shutdown.
    pub idle_timeout: Duration,
    /// Cap for the result log and the latency log.
    pub max_log_entries: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.channel_capacity < MIN_CAPACITY || !self.channel_capacity.is_power_of_two() {
            return Err(QueueError::InvalidConfig(format!(
                "Channel capacity ({}) must be a power of two and at least {MIN_CAPACITY}",
                self.channel_capacity
            )));
        }

        if self.idle_timeout.is_zero() {
            return Err(QueueError::InvalidConfig(
                "Idle timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_capacity() {
        for capacity in [0, 1, 3, 1000] {
            let config = QueueConfig {
                channel_capacity: capacity,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(QueueError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_idle_timeout() {
        let config = QueueConfig {
            idle_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
