use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::LmSensorsConfig;
use crate::application::CollectorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poll_interval: u64,
    pub history_size: usize,
    pub refresh_interval_ms: u64,
    pub history_window_minutes: u64,
    pub sensors_command: String,
    pub sensors_timeout: u64,
    pub log_level: String,
}

impl Config {
    /// Defaults, then the TOML file named by `THERMOMON_CONFIG` (if any),
    /// then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("THERMOMON_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|name| env::var(name).ok()))
    }

    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `THERMOMON_*` overrides; values that fail to parse are ignored
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "THERMOMON_POLL_INTERVAL", &mut self.poll_interval);
        override_parsed(&lookup, "THERMOMON_HISTORY_SIZE", &mut self.history_size);
        override_parsed(&lookup, "THERMOMON_REFRESH_INTERVAL_MS", &mut self.refresh_interval_ms);
        override_parsed(&lookup, "THERMOMON_HISTORY_WINDOW", &mut self.history_window_minutes);
        override_parsed(&lookup, "THERMOMON_SENSORS_TIMEOUT", &mut self.sensors_timeout);
        if let Some(command) = lookup("THERMOMON_SENSORS_COMMAND") {
            self.sensors_command = command;
        }
        if let Some(level) = lookup("THERMOMON_LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig::new(Duration::from_secs(self.poll_interval), self.history_size)
    }

    pub fn sensors(&self) -> LmSensorsConfig {
        LmSensorsConfig::new(
            self.sensors_command.clone(),
            Duration::from_secs(self.sensors_timeout),
        )
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(name).and_then(|s| s.parse().ok()) {
        *target = value;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: 5,
            history_size: 1000,
            refresh_interval_ms: 1000,
            history_window_minutes: 60,
            sensors_command: "sensors".to_string(),
            sensors_timeout: 10,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.collector().interval, Duration::from_secs(5));
        assert_eq!(config.collector().history_capacity, 1000);
        assert_eq!(config.sensors().timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str("poll_interval = 2\nsensors_command = \"/usr/bin/sensors\"\n").unwrap();
        assert_eq!(config.poll_interval, 2);
        assert_eq!(config.sensors_command, "/usr/bin/sensors");
        assert_eq!(config.history_size, 1000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("poll_interval = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/thermomon.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("THERMOMON_POLL_INTERVAL", "3"),
            ("THERMOMON_HISTORY_SIZE", "not-a-number"),
            ("THERMOMON_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.poll_interval, 3);
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.log_level, "debug");
    }
}
