//! Limiter configuration.

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::FixedWindow;

/// Errors raised while loading limiter configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Window length and quota for one named limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Admitted requests per key and window.
    pub max_requests: NonZeroU32,
}

impl LimitConfig {
    pub const fn new(window_ms: u64, max_requests: NonZeroU32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Builds a limiter with this configuration.
    pub fn build(&self, name: &str) -> FixedWindow {
        FixedWindow::new(self.max_requests, Duration::from_millis(self.window_ms)).with_name(name)
    }
}

const FIFTEEN_MINUTES: u64 = 15 * 60 * 1000;
const ONE_HOUR: u64 = 60 * 60 * 1000;

// Evaluated at compile time, so a zero quota here fails the build.
const LOGIN: LimitConfig = LimitConfig::new(FIFTEEN_MINUTES, NonZeroU32::new(5).unwrap());
const CONTACT: LimitConfig = LimitConfig::new(ONE_HOUR, NonZeroU32::new(3).unwrap());
const API: LimitConfig = LimitConfig::new(FIFTEEN_MINUTES, NonZeroU32::new(100).unwrap());
const CONTENT: LimitConfig = LimitConfig::new(ONE_HOUR, NonZeroU32::new(10).unwrap());

/// Configuration for every named limiter of the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Login attempts
    #[serde(default = "default_login")]
    pub login: LimitConfig,

    /// Contact form submissions
    #[serde(default = "default_contact")]
    pub contact: LimitConfig,

    /// Generic API calls
    #[serde(default = "default_api")]
    pub api: LimitConfig,

    /// Content generation calls
    #[serde(default = "default_content")]
    pub content: LimitConfig,

    /// How often expired keys are swept, in milliseconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            login: default_login(),
            contact: default_contact(),
            api: default_api(),
            content: default_content(),
            cleanup_interval_ms: default_cleanup_interval(),
        }
    }
}

fn default_login() -> LimitConfig {
    LOGIN
}

fn default_contact() -> LimitConfig {
    CONTACT
}

fn default_api() -> LimitConfig {
    API
}

fn default_content() -> LimitConfig {
    CONTENT
}

fn default_cleanup_interval() -> u64 {
    5 * 60 * 1000
}

impl LimitsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate YAML configuration.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: LimitsConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects windows and sweep intervals of zero length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, limit) in self.named() {
            if limit.window_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}: window_ms must be greater than zero"
                )));
            }
        }
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub(crate) fn named(&self) -> [(&'static str, &LimitConfig); 4] {
        [
            ("login", &self.login),
            ("contact", &self.contact),
            ("api", &self.api),
            ("content", &self.content),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::Strategy;

    #[test]
    fn defaults_match_the_site_limits() {
        let config = LimitsConfig::default();

        assert_eq!(config.login.window_ms, 900_000);
        assert_eq!(config.login.max_requests.get(), 5);
        assert_eq!(config.contact.window_ms, 3_600_000);
        assert_eq!(config.contact.max_requests.get(), 3);
        assert_eq!(config.api.window_ms, 900_000);
        assert_eq!(config.api.max_requests.get(), 100);
        assert_eq!(config.content.window_ms, 3_600_000);
        assert_eq!(config.content.max_requests.get(), 10);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let yaml = r#"
login:
  window_ms: 60000
  max_requests: 2
"#;
        let config = LimitsConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.login.window_ms, 60_000);
        assert_eq!(config.login.max_requests.get(), 2);
        assert_eq!(config.api, LimitsConfig::default().api);
        assert_eq!(config.cleanup_interval_ms, 300_000);
    }

    #[test]
    fn zero_quota_is_a_parse_error() {
        let yaml = r#"
contact:
  window_ms: 1000
  max_requests: 0
"#;
        assert!(matches!(
            LimitsConfig::from_yaml_str(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_window_is_invalid() {
        let yaml = r#"
content:
  window_ms: 0
  max_requests: 4
"#;
        let err = LimitsConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn zero_cleanup_interval_is_invalid() {
        let err = LimitsConfig::from_yaml_str("cleanup_interval_ms: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn it_loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api:\n  window_ms: 1000\n  max_requests: 9").unwrap();

        let config = LimitsConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.max_requests.get(), 9);
    }

    #[test]
    fn a_missing_file_is_an_io_error() {
        let err = LimitsConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn build_names_the_limiter() {
        let limiter = LimitsConfig::default().contact.build("contact");
        assert_eq!(limiter.name(), "contact");
        assert_eq!(limiter.limit(), 3);
        assert_eq!(limiter.window(), Duration::from_secs(3600));
    }
}
