use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `TRAWLER_DATABASE__PATH`.
pub const ENV_PREFIX: &str = "TRAWLER_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_with_env_prefix(path, ENV_PREFIX)
}

fn load_with_env_prefix(path: &Path, prefix: &str) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    // Sections are separated by a double underscore so that keys like
    // `busy_timeout_ms` stay intact.
    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[spider]
port = 7000

[retry]
max_attempts = 5
delay_ms = 10

[lifecycle]
policy = "self_restart"
restart_after_events = 50
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.spider.port, Some(7000));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 10);
        assert_eq!(config.lifecycle.policy, Some(LifecycleMode::SelfRestart));
        assert_eq!(config.lifecycle.restart_after_events, 50);
        assert_eq!(config.lifecycle.bind_attempts, 10);
    }

    #[test]
    fn test_load_config_from_str_empty() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_config_from_str_invalid_type() {
        let toml = r#"
[spider]
port = "not a port"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_unknown_policy() {
        let toml = r#"
[lifecycle]
policy = "sometimes"
"#;
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[spider]
host = "127.0.0.1"
port = 6999

[database]
path = "/tmp/catalog.db"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.spider.port, Some(6999));
        assert_eq!(config.spider.host.to_string(), "127.0.0.1");
        assert_eq!(config.database.path.to_str(), Some("/tmp/catalog.db"));
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[database]
busy_timeout_ms = 100
"#
        )
        .unwrap();

        // Unique prefix so parallel tests do not observe it.
        std::env::set_var("TRAWLERLOADERTEST_DATABASE__BUSY_TIMEOUT_MS", "250");
        let config = load_with_env_prefix(temp_file.path(), "TRAWLERLOADERTEST_").unwrap();
        std::env::remove_var("TRAWLERLOADERTEST_DATABASE__BUSY_TIMEOUT_MS");

        assert_eq!(config.database.busy_timeout_ms, 250);
    }

    #[test]
    fn test_example_config_parses() {
        let config = load_config_from_str(include_str!("../../../../config.example.toml")).unwrap();
        assert_eq!(config.spider.port, None);
        assert_eq!(config.lifecycle.policy, None);
        assert_eq!(config.metrics.port, 9464);
        assert!(crate::config::validate_config(&config).is_ok());
    }
}
