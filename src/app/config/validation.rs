use super::{Config, ConfigError};
use crate::buffer::MIN_CAPACITY;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate channel capacity
        if self.channel_capacity < MIN_CAPACITY || !self.channel_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidConfig(format!(
                "Channel capacity ({}) must be a power of two and at least {MIN_CAPACITY}",
                self.channel_capacity
            )));
        }

        // Validate idle timeout
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Idle timeout must be greater than 0".to_string(),
            ));
        }

        // Validate log caps
        if self.max_log_entries == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max log entries must be greater than 0".to_string(),
            ));
        }

        if self.bench == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "Number of operations must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            Config {
                channel_capacity: 1000,
                ..Config::default()
            },
            Config {
                channel_capacity: 1,
                ..Config::default()
            },
            Config {
                idle_timeout_ms: 0,
                ..Config::default()
            },
            Config {
                max_log_entries: 0,
                ..Config::default()
            },
            Config {
                bench: Some(0),
                ..Config::default()
            },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidConfig(_))),
                "expected rejection: {config:?}"
            );
        }
    }
}
