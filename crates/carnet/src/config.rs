//! Configuration management for carnet.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::daemon::DaemonOptions;
use crate::error::{Error, Result};
use crate::settings::{NotificationSettings, MAX_HOUR, MAX_NOTIFICATION_DAYS, MIN_NOTIFICATION_DAYS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "carnet";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "carnet.db";

/// Prefix of environment variable overrides.
const ENV_PREFIX: &str = "CARNET_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CARNET_`, sections split on `__`,
///    e.g. `CARNET_REMINDERS__NOTIFICATION_DAYS=14`)
/// 2. TOML config file at `~/.config/carnet/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Reminder defaults.
    pub reminders: RemindersConfig,
    /// Daemon configuration.
    pub daemon: DaemonConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/carnet/carnet.db`
    pub database_path: Option<PathBuf>,
}

/// Reminder defaults, used wherever the user has not saved a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindersConfig {
    /// Lead window in days.
    pub notification_days: u16,
    /// Hours of day reminders fire at.
    pub notification_hours: Vec<u8>,
    /// Days before expiry reminders fire at.
    pub notification_intervals: Vec<u16>,
    /// Whether reminders are on.
    pub enabled: bool,
    /// Settings profile, one per user.
    pub profile: String,
}

/// Daemon-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Hours between unprompted reminder rebuilds.
    pub refresh_interval_hours: u32,
    /// Seconds between outbox delivery checks.
    pub delivery_poll_seconds: u64,
    /// Seconds to wait before the first cycle.
    pub startup_delay_seconds: u64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        let defaults = NotificationSettings::default();
        Self {
            notification_days: defaults.notification_days,
            notification_hours: defaults.notification_hours,
            notification_intervals: defaults.notification_intervals,
            enabled: defaults.enabled,
            profile: "default".to_string(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            refresh_interval_hours: 24,
            delivery_poll_seconds: 60,
            startup_delay_seconds: 5,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `CARNET_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let reminders = &self.reminders;
        if !(MIN_NOTIFICATION_DAYS..=MAX_NOTIFICATION_DAYS).contains(&reminders.notification_days)
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "notification_days must be between {MIN_NOTIFICATION_DAYS} and {MAX_NOTIFICATION_DAYS}, got {}",
                    reminders.notification_days
                ),
            });
        }

        if reminders.notification_hours.is_empty() {
            return Err(Error::ConfigValidation {
                message: "notification_hours must not be empty".to_string(),
            });
        }
        if let Some(hour) = reminders.notification_hours.iter().find(|h| **h > MAX_HOUR) {
            return Err(Error::ConfigValidation {
                message: format!("notification_hours contains invalid hour {hour}"),
            });
        }

        if reminders.notification_intervals.is_empty() {
            return Err(Error::ConfigValidation {
                message: "notification_intervals must not be empty".to_string(),
            });
        }
        if let Some(offset) = reminders
            .notification_intervals
            .iter()
            .find(|o| **o > MAX_NOTIFICATION_DAYS)
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "notification_intervals contains {offset}, above {MAX_NOTIFICATION_DAYS}"
                ),
            });
        }

        if reminders.profile.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "profile must not be empty".to_string(),
            });
        }

        if self.daemon.refresh_interval_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "refresh_interval_hours must be greater than 0".to_string(),
            });
        }

        if self.daemon.delivery_poll_seconds == 0 {
            return Err(Error::ConfigValidation {
                message: "delivery_poll_seconds must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Notification settings used where nothing has been saved.
    #[must_use]
    pub fn default_settings(&self) -> NotificationSettings {
        NotificationSettings {
            notification_days: self.reminders.notification_days,
            notification_hours: self.reminders.notification_hours.clone(),
            notification_intervals: self.reminders.notification_intervals.clone(),
            enabled: self.reminders.enabled,
        }
        .normalized()
    }

    /// Get the refresh interval as a Duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.daemon.refresh_interval_hours) * 60 * 60)
    }

    /// Daemon timing derived from the configuration.
    #[must_use]
    pub fn daemon_options(&self) -> DaemonOptions {
        DaemonOptions {
            refresh_interval: self.refresh_interval(),
            delivery_poll: Duration::from_secs(self.daemon.delivery_poll_seconds),
            startup_delay: Duration::from_secs(self.daemon.startup_delay_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(config.reminders.enabled);
        assert_eq!(config.reminders.profile, "default");
    }

    #[test]
    fn test_default_reminders_match_settings_defaults() {
        let config = Config::default();
        assert_eq!(config.default_settings(), NotificationSettings::default());
    }

    #[test]
    fn test_default_daemon_config() {
        let daemon = DaemonConfig::default();

        assert_eq!(daemon.refresh_interval_hours, 24);
        assert_eq!(daemon.delivery_poll_seconds, 60);
        assert_eq!(daemon.startup_delay_seconds, 5);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_notification_days() {
        let mut config = Config::default();
        config.reminders.notification_days = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("notification_days"));

        config.reminders.notification_days = 366;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hours() {
        let mut config = Config::default();
        config.reminders.notification_hours = vec![];
        assert!(config.validate().unwrap_err().to_string().contains("empty"));

        config.reminders.notification_hours = vec![9, 24];
        assert!(config.validate().unwrap_err().to_string().contains("24"));
    }

    #[test]
    fn test_validate_intervals() {
        let mut config = Config::default();
        config.reminders.notification_intervals = vec![];
        assert!(config.validate().is_err());

        config.reminders.notification_intervals = vec![400];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_blank_profile() {
        let mut config = Config::default();
        config.reminders.profile = "  ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("profile"));
    }

    #[test]
    fn test_validate_zero_intervals() {
        let mut config = Config::default();
        config.daemon.refresh_interval_hours = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("refresh_interval_hours"));

        let mut config = Config::default();
        config.daemon.delivery_poll_seconds = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("delivery_poll_seconds"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("carnet.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_settings_are_normalized() {
        let mut config = Config::default();
        config.reminders.notification_hours = vec![18, 9, 18];
        config.reminders.notification_intervals = vec![0, 7];
        let settings = config.default_settings();
        assert_eq!(settings.notification_hours, vec![9, 18]);
        assert_eq!(settings.notification_intervals, vec![7, 0]);
    }

    #[test]
    fn test_daemon_options() {
        let options = Config::default().daemon_options();
        assert_eq!(options, DaemonOptions::default());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("carnet"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_default_data_dir() {
        let path = Config::default_data_dir();
        assert!(path.to_string_lossy().contains("carnet"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_toml_file() {
        let path = std::env::temp_dir().join(format!("carnet_config_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[storage]
database_path = "/tmp/carnet-test.db"

[reminders]
notification_days = 14
notification_hours = [8]

[daemon]
delivery_poll_seconds = 30
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/carnet-test.db"));
        assert_eq!(config.reminders.notification_days, 14);
        assert_eq!(config.reminders.notification_hours, vec![8]);
        assert_eq!(config.reminders.notification_intervals, vec![7, 3, 1, 0]);
        assert_eq!(config.daemon.delivery_poll_seconds, 30);
        assert_eq!(config.daemon.refresh_interval_hours, 24);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("carnet_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "[reminders]\nnotification_days = 0\n").unwrap();

        let result = Config::load_from(Some(path.clone()));
        std::fs::remove_file(&path).unwrap();

        assert!(result.unwrap_err().is_validation_error());
    }

    #[test]
    fn test_reminders_config_deserialize() {
        let json = r#"{"notification_days": 10, "enabled": false}"#;
        let reminders: RemindersConfig = serde_json::from_str(json).unwrap();
        assert_eq!(reminders.notification_days, 10);
        assert!(!reminders.enabled);
        assert_eq!(reminders.notification_hours, vec![9, 18]);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("notification_intervals"));
        assert!(json.contains("delivery_poll_seconds"));
    }
}
