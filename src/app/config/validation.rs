use super::{Config, ConfigError};
use std::time::Duration;
use url::Url;

/// Largest number of events the service accepts in one submission.
pub const MAX_BATCH_SIZE: usize = 10_000;

const MAX_NAME_LEN: usize = 512;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_batch_size(self.max_batch_size)?;
        validate_poll_interval(Duration::from_millis(self.poll_interval_ms))?;
        validate_log_group_name(&self.log_group_name)?;

        if let Some(stream) = &self.log_stream_name {
            validate_log_stream_name(stream)?;
        }

        if let Some(endpoint) = &self.endpoint {
            Url::parse(endpoint).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid endpoint URL '{endpoint}': {e}"))
            })?;
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.logger_name.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Logger name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn validate_batch_size(max_batch_size: usize) -> Result<(), ConfigError> {
    if max_batch_size == 0 {
        return Err(ConfigError::InvalidConfig(
            "Batch size must be greater than 0".to_string(),
        ));
    }
    if max_batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::InvalidConfig(format!(
            "Batch size ({max_batch_size}) exceeds the service limit of {MAX_BATCH_SIZE} events"
        )));
    }
    Ok(())
}

pub fn validate_poll_interval(poll_interval: Duration) -> Result<(), ConfigError> {
    if poll_interval.is_zero() {
        return Err(ConfigError::InvalidConfig(
            "Poll interval must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Group names: 1-512 characters from `[.\-_/#A-Za-z0-9]`.
pub fn validate_log_group_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ConfigError::InvalidConfig(format!(
            "Log group name must be 1-{MAX_NAME_LEN} characters, got {}",
            name.len()
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | '#')))
    {
        return Err(ConfigError::InvalidConfig(format!(
            "Log group name '{name}' contains illegal character '{c}'"
        )));
    }
    Ok(())
}

/// Stream names: 1-512 characters, no `:` or `*`.
pub fn validate_log_stream_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ConfigError::InvalidConfig(format!(
            "Log stream name must be 1-{MAX_NAME_LEN} characters, got {}",
            name.len()
        )));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, ':' | '*')) {
        return Err(ConfigError::InvalidConfig(format!(
            "Log stream name '{name}' contains illegal character '{c}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_bounds() {
        assert!(validate_batch_size(0).is_err());
        assert!(validate_batch_size(1).is_ok());
        assert!(validate_batch_size(MAX_BATCH_SIZE).is_ok());
        assert!(validate_batch_size(MAX_BATCH_SIZE + 1).is_err());
    }

    #[test]
    fn test_group_names() {
        assert!(validate_log_group_name("/aws/app-1_prod.#x").is_ok());
        assert!(validate_log_group_name("").is_err());
        assert!(validate_log_group_name("has space").is_err());
        assert!(validate_log_group_name(&"a".repeat(513)).is_err());
    }

    #[test]
    fn test_stream_names() {
        assert!(validate_log_stream_name("2024-01-01 10.00.00.000 host").is_ok());
        assert!(validate_log_stream_name("10:00").is_err());
        assert!(validate_log_stream_name("a*b").is_err());
        assert!(validate_log_stream_name("").is_err());
    }

    #[test]
    fn test_config_rejects_bad_endpoint() {
        let config = Config {
            endpoint: Some("::not a url".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
