use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Listen and metrics ports are not 0
/// - Retry and bind attempts are at least 1
/// - Restart threshold is at least 1
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.spider.port == Some(0) {
        return Err(ConfigError::ValidationError(
            "spider.port cannot be 0".to_string(),
        ));
    }

    if config.metrics.enabled && config.metrics.port == 0 {
        return Err(ConfigError::ValidationError(
            "metrics.port cannot be 0".to_string(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.lifecycle.restart_after_events == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.restart_after_events must be at least 1".to_string(),
        ));
    }

    if config.lifecycle.bind_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.bind_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
