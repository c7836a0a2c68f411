use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::monitor::MAX_INTERVAL_SECS;
use crate::monitor::MIN_INTERVAL_SECS;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub target_url: String,
    pub admin_ids: Vec<i64>,
    pub default_interval: Duration,
    pub db_url: String,
    pub db_path: String,
    pub data_path: PathBuf,
    pub logs_path: PathBuf,
    pub webdriver_url: String,
    pub probe_timeout: Duration,
    pub screenshot_on_slots: bool,
}

impl Config {
    pub fn new() -> Result<Self, AppError> {
        let default_interval_secs =
            Self::parse_u64("DEFAULT_INTERVAL_SECONDS", &Self::env_or("DEFAULT_INTERVAL_SECONDS", "180"))?;
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&default_interval_secs) {
            return Err(AppError::InvalidConfig {
                key: "DEFAULT_INTERVAL_SECONDS".into(),
                reason: format!(
                    "must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds, got {default_interval_secs}"
                ),
            });
        }

        let probe_timeout_secs =
            Self::parse_u64("PROBE_TIMEOUT_SECONDS", &Self::env_or("PROBE_TIMEOUT_SECONDS", "90"))?;

        Ok(Self {
            bot_token: Self::get_env("TG_BOT_TOKEN")?,
            target_url: Self::get_env("TARGET_URL")?,
            admin_ids: Self::parse_admins("ADMINS", &Self::env_or("ADMINS", ""))?,
            default_interval: Duration::from_secs(default_interval_secs),
            db_url: Self::env_or("DB_URL", "sqlite://data/cita-bot.db"),
            db_path: Self::env_or("DB_PATH", "data/cita-bot.db"),
            data_path: PathBuf::from(Self::env_or("DATA_DIR", "data")),
            logs_path: PathBuf::from(Self::env_or("LOG_DIR", "logs")),
            webdriver_url: Self::env_or("WEBDRIVER_URL", "http://localhost:9515"),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            screenshot_on_slots: Self::parse_bool("SCREENSHOT_ON_SLOTS", &Self::env_or("SCREENSHOT_ON_SLOTS", "true"))?,
        })
    }

    /// Creates the data, screenshot, and log directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        std::fs::create_dir_all(&self.data_path)?;
        std::fs::create_dir_all(self.data_path.join("screenshots"))?;
        std::fs::create_dir_all(&self.logs_path)?;
        Ok(())
    }

    /// Where probe evidence is written. A single file, overwritten on each capture.
    pub fn screenshot_path(&self) -> PathBuf {
        self.data_path.join("screenshots").join("last_check.png")
    }

    fn get_env(key: &str) -> Result<String, AppError> {
        match env::var(key) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(AppError::MissingConfig { key: key.into() }),
        }
    }

    fn env_or(key: &str, default: &str) -> String {
        env::var(key).ok().filter(|value| !value.trim().is_empty()).unwrap_or_else(|| default.into())
    }

    fn parse_u64(key: &str, raw: &str) -> Result<u64, AppError> {
        raw.trim().parse::<u64>().map_err(|_| AppError::InvalidConfig {
            key: key.into(),
            reason: format!("expected a non-negative integer, got \"{raw}\""),
        })
    }

    fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(AppError::InvalidConfig {
                key: key.into(),
                reason: format!("expected a boolean, got \"{raw}\""),
            }),
        }
    }

    fn parse_admins(key: &str, raw: &str) -> Result<Vec<i64>, AppError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<i64>().map_err(|_| AppError::InvalidConfig {
                    key: key.into(),
                    reason: format!("expected a comma-separated list of chat ids, got \"{entry}\""),
                })
            })
            .collect()
    }
}
