use mschapv2_proto::mschapv2::MschapV2Config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Handler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// EAP-MSCHAPv2 method settings
    #[serde(default)]
    pub mschapv2: MschapV2Config,

    /// Seconds an idle session is kept before it is dropped (default: 300)
    #[serde(default = "default_session_timeout")]
    pub session_timeout: u64,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_session_timeout() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mschapv2: MschapV2Config::default(),
            session_timeout: default_session_timeout(),
            log_level: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mschapv2
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("mschapv2: {}", e)))?;

        if self.session_timeout == 0 {
            return Err(ConfigError::Invalid("session_timeout cannot be 0".to_string()));
        }

        if let Some(level) = &self.log_level {
            if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
                return Err(ConfigError::Invalid(format!("Unknown log level: {}", level)));
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        Config {
            mschapv2: MschapV2Config {
                with_ntdomain_hack: false,
                send_error: true,
                ..MschapV2Config::default()
            },
            session_timeout: 300,
            log_level: Some("info".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mschapv2_proto::mschapv2::MAX_IDENTITY_LEN;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session_timeout, 300);
        assert!(!config.mschapv2.send_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.mschapv2.identity = "x".repeat(MAX_IDENTITY_LEN);
        assert!(config.validate().is_ok());
        config.mschapv2.identity.push('x');
        let Err(ConfigError::Invalid(message)) = config.validate() else {
            panic!("expected invalid identity");
        };
        assert!(message.starts_with("mschapv2: "));

        let mut config = Config::default();
        config.session_timeout = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_level = Some("loud".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"mschapv2": {"send_error": true}}"#).unwrap();
        assert!(config.mschapv2.send_error);
        assert!(!config.mschapv2.with_ntdomain_hack);
        assert!(config.mschapv2.identity.starts_with("eap-mschapv2-"));
        assert_eq!(config.session_timeout, 300);

        let empty: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Config::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "mschapv2": {{ "with_ntdomain_hack": true, "identity": "radius.example.com" }},
                "session_timeout": 60,
                "log_level": "debug"
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.mschapv2.with_ntdomain_hack);
        assert_eq!(config.mschapv2.identity, "radius.example.com");
        assert_eq!(config.session_timeout(), Duration::from_secs(60));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_from_file_rejects_long_identity() {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::json!({ "mschapv2": { "identity": "n".repeat(300) } });
        write!(file, "{}", json).unwrap();

        assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            Config::from_file("/nonexistent/mschapv2.json"),
            Err(ConfigError::Io(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_example_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        Config::example().to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::example());
    }
}
