//! Environment configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const TOKEN_ENV: &str = "BOT_TOKEN";
pub const DATA_DIR_ENV: &str = "BOT_DATA_DIR";
pub const STORE_TIMEOUT_ENV: &str = "ROW_COUNTER_STORE_TIMEOUT_MS";
pub const POLL_TIMEOUT_ENV: &str = "ROW_COUNTER_POLL_TIMEOUT_SECS";
pub const ONBOARDING_ANIMATION_ENV: &str = "ROW_COUNTER_ONBOARDING_ANIMATION";
pub const IDLE_TIMEOUT_ENV: &str = "ROW_COUNTER_IDLE_TIMEOUT_SECS";

const DB_FILE_NAME: &str = "bot.sqlite";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_ONBOARDING_ANIMATION: &str =
    "https://media.giphy.com/media/3oEhmHmWP3Y9wQxoli/giphy-downsized.gif";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub token: String,
    pub data_dir: PathBuf,
    pub store_timeout: Duration,
    pub poll_timeout_secs: u64,
    /// How long a conversation runtime lingers without events
    pub idle_timeout: Duration,
    pub onboarding_animation: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get(TOKEN_ENV).ok_or(ConfigError::Missing(TOKEN_ENV))?;
        let data_dir = get(DATA_DIR_ENV).map_or_else(|| PathBuf::from("."), PathBuf::from);
        let store_timeout_ms =
            parse_positive(STORE_TIMEOUT_ENV, get(STORE_TIMEOUT_ENV), DEFAULT_STORE_TIMEOUT_MS)?;
        let poll_timeout_secs =
            parse_positive(POLL_TIMEOUT_ENV, get(POLL_TIMEOUT_ENV), DEFAULT_POLL_TIMEOUT_SECS)?;
        let idle_timeout_secs =
            parse_positive(IDLE_TIMEOUT_ENV, get(IDLE_TIMEOUT_ENV), DEFAULT_IDLE_TIMEOUT_SECS)?;
        let onboarding_animation = get(ONBOARDING_ANIMATION_ENV)
            .unwrap_or_else(|| DEFAULT_ONBOARDING_ANIMATION.to_string());

        Ok(Self {
            token,
            data_dir,
            store_timeout: Duration::from_millis(store_timeout_ms),
            poll_timeout_secs,
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            onboarding_animation,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

fn parse_positive(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}
