//! Configuration loading.
//!
//! Precedence, lowest first: built-in defaults, the TOML file (if any),
//! environment variables. The merged result is validated once.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::env::apply_overrides;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Env {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document into a config. Missing sections keep their defaults.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load, override and validate configuration.
///
/// `lookup` resolves environment variables; pass `|k| std::env::var(k).ok()`
/// in production.
pub fn load_config<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file() {
        let config = load_config(None, no_env).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn env_wins_over_file() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[listener]\nbind_address = \"127.0.0.1:7000\"").unwrap();
        writeln!(file, "[backends.auth]\naddress = \"http://10.0.0.1:9090\"").unwrap();
        drop(file);

        let config = load_config(Some(&path), |key| {
            (key == "GATEWAY_PORT").then(|| "7100".to_string())
        })
        .unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:7100");
        assert_eq!(config.backends.auth.address, "http://10.0.0.1:9090");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/gateway.toml")), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_values_report_every_field() {
        let mut raw = String::from("[backends.chat]\naddress = \"ftp://chat\"\ntimeout_ms = 0\n");
        raw.push_str("[backends.chat.retry]\nmax_attempts = 0\n");
        let config = parse_config(&raw).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3, "{:?}", errors);

        let message = ConfigError::Validation(errors).to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("backends.chat"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
    }
}
