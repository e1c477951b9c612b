//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Scheduler tick resolution.
    pub tick: Duration,
    /// Interval between reconciliation passes.
    pub reconcile_interval: Duration,
    /// Interval between discovery passes.
    pub discover_interval: Duration,
    /// Interval between cache-expiry passes.
    pub cache_expiry_interval: Duration,
    /// Consecutive lookup misses tolerated before a torrent row is evicted.
    pub miss_threshold: u32,
    /// Label attached to torrents managed by this service.
    pub managed_label: String,
    pub telegram: TelegramConfig,
    pub deluge: DelugeConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
}

/// Deluge web UI settings.
#[derive(Debug, Clone)]
pub struct DelugeConfig {
    /// Base URL of the web UI, e.g. `http://localhost:8112`.
    pub url: String,
    pub password: SecretString,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./data/seedwatch.db".to_string(),
            tick: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(60),
            discover_interval: Duration::from_secs(300),
            cache_expiry_interval: Duration::from_secs(3600),
            miss_threshold: 3,
            managed_label: "seedwatch".to_string(),
            telegram: TelegramConfig {
                bot_token: SecretString::from(String::new()),
            },
            deluge: DelugeConfig {
                url: "http://localhost:8112".to_string(),
                password: SecretString::from(String::new()),
            },
        }
    }
}

impl Config {
    /// Build a configuration from the environment.
    ///
    /// `TELEGRAM_BOT_TOKEN` and `DELUGE_PASSWORD` are required; everything
    /// else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;
        let deluge_password = std::env::var("DELUGE_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("DELUGE_PASSWORD".to_string()))?;

        Ok(Self {
            tick: defaults.tick,
            miss_threshold: defaults.miss_threshold,
            db_path: std::env::var("SEEDWATCH_DB_PATH").unwrap_or(defaults.db_path),
            reconcile_interval: env_secs("SEEDWATCH_RECONCILE_SECS", defaults.reconcile_interval)?,
            discover_interval: env_secs("SEEDWATCH_DISCOVER_SECS", defaults.discover_interval)?,
            cache_expiry_interval: env_secs(
                "SEEDWATCH_CACHE_EXPIRY_SECS",
                defaults.cache_expiry_interval,
            )?,
            managed_label: std::env::var("SEEDWATCH_LABEL").unwrap_or(defaults.managed_label),
            telegram: TelegramConfig {
                bot_token: SecretString::from(bot_token),
            },
            deluge: DelugeConfig {
                url: std::env::var("DELUGE_URL").unwrap_or(defaults.deluge.url),
                password: SecretString::from(deluge_password),
            },
        })
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected seconds as integer, got '{raw}'"),
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
