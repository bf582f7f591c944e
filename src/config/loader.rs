//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_INSTRUMENTATION_KEY: &str = "INSTRUMENTATION_KEY";
pub const ENV_TABLE_CONNECTION_STRING: &str = "TABLE_CONNECTION_STRING";
pub const ENV_QUEUE_CONNECTION_STRING: &str = "QUEUE_CONNECTION_STRING";
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Overlay environment-provided values on top of file/default configuration.
///
/// `lookup` abstracts `std::env::var` so tests never touch the process env.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_INSTRUMENTATION_KEY) {
        config.telemetry.instrumentation_key = key;
    }
    if let Some(conn) = lookup(ENV_TABLE_CONNECTION_STRING) {
        config.storage.table_connection_string = conn;
    }
    if let Some(conn) = lookup(ENV_QUEUE_CONNECTION_STRING) {
        config.storage.queue_connection_string = conn;
    }
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
}

/// Values given on the command line. They win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
}

impl CliOverrides {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(addr) = &self.bind_address {
            config.listener.bind_address = addr.clone();
        }
    }
}

/// Load configuration from an optional TOML file, then the environment, then
/// command-line overrides, and validate the result.
pub fn load_config(path: Option<&Path>, overrides: &CliOverrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: ProxyConfig = toml::from_str(
            r#"
            [storage]
            table_connection_string = "from-file"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_TABLE_CONNECTION_STRING, "from-env"),
            (ENV_INSTRUMENTATION_KEY, "ikey"),
        ]
        .into_iter()
        .collect();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.table_connection_string, "from-env");
        assert_eq!(config.telemetry.instrumentation_key, "ikey");
        assert!(config.storage.queue_connection_string.is_empty());
    }

    #[test]
    fn test_unset_env_keeps_file_values() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:9000".to_string();
        apply_env_overrides(&mut config, |_| None);
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage\ntimeout_secs = 3").unwrap();
        let err = load_config(Some(file.path()), &CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(
            Some(Path::new("/nonexistent/storage-proxy.toml")),
            &CliOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_cli_bind_override_is_validated() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let overrides = CliOverrides {
            bind_address: Some("not-an-address".to_string()),
        };
        let err = load_config(Some(file.path()), &overrides).unwrap_err();
        let ConfigError::Validation(errors) = err else {
            panic!("expected validation errors, got {:?}", err);
        };
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::Invalid { field: "listener.bind_address", .. }
        )));
    }

    #[test]
    fn test_cli_bind_override_wins() {
        let mut config = ProxyConfig::default();
        apply_env_overrides(&mut config, |k| {
            (k == ENV_BIND_ADDRESS).then(|| "127.0.0.1:7000".to_string())
        });
        CliOverrides {
            bind_address: Some("127.0.0.1:7001".to_string()),
        }
        .apply(&mut config);
        assert_eq!(config.listener.bind_address, "127.0.0.1:7001");
    }
}
