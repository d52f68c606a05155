//! Layered application configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`classifier.toml` in the working directory unless a path is given), and
//! `PETVISION__`-prefixed environment variables using `__` as the section
//! separator, e.g. `PETVISION__CLASSIFIER__TOP_K=3`.

use classifier::{ClassifierSettings, SettingsError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

/// Config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "classifier";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PETVISION";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid configuration: {0}")]
    Classifier(#[from] SettingsError),
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Largest accepted request body (bytes)
    pub max_upload_bytes: usize,

    /// Allow any origin, method and header
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            cors_permissive: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Max level: trace, debug, info, warn or error
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.level)))
    }
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub classifier: ClassifierSettings,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: AppConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be positive".to_string(),
            ));
        }
        self.logging.max_level()?;
        self.classifier.validate()?;
        Ok(())
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_addr.parse().map_err(|_| {
            let addr = &self.server.bind_addr;
            ConfigError::Invalid(format!("invalid server.bind_addr {:?}", addr))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.top_k, 5);
        assert_eq!(config.server.bind_addr, "0.0.0.0:8000");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("petvision-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[server]
bind_addr = "127.0.0.1:9100"

[classifier]
model_path = "/models/pets.onnx"
labels_path = "/models/pets.txt"

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9100");
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.classifier.model_path, PathBuf::from("/models/pets.onnx"));
        assert_eq!(config.logging.max_level().unwrap(), Level::DEBUG);
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/petvision.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.server.bind_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.classifier.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Classifier(SettingsError::ZeroTopK))
        ));
    }
}
