//! Configuration for the moodsheet bot.
//!
//! Settings come from the environment. Secrets are usually kept in an env
//! file under the config directory, which is loaded before the environment is
//! read:
//!
//! ```text
//! ~/.moodsheet/
//! └── config/
//!     └── .env.local   # TELEGRAM_BOT_TOKEN, NOTION_TOKEN, ...
//! ```
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `NOTION_TOKEN`: Notion integration token
//!
//! Optional:
//! - `TELEGRAM_GROUP_CHAT_ID`: Chat that receives the daily prompt
//! - `NOTION_TRACKER_PAGE_ID`: Page holding the tracker tables
//! - `MOODSHEET_PROMPT_TIME`: Daily prompt time, `HH:MM` local (default 21:00)
//! - `MOODSHEET_CONFIRM_TTL_SECS`: Lifetime of an overwrite confirmation (default 900)
//! - `MOODSHEET_CONFIG_DIR`: Override the config directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use tracing::debug;

use crate::error::ConfigError;

pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const GROUP_CHAT_ID_ENV: &str = "TELEGRAM_GROUP_CHAT_ID";
pub const NOTION_TOKEN_ENV: &str = "NOTION_TOKEN";
pub const PAGE_ID_ENV: &str = "NOTION_TRACKER_PAGE_ID";
pub const PROMPT_TIME_ENV: &str = "MOODSHEET_PROMPT_TIME";
pub const CONFIRM_TTL_ENV: &str = "MOODSHEET_CONFIRM_TTL_SECS";
pub const CONFIG_DIR_ENV: &str = "MOODSHEET_CONFIG_DIR";

/// Tracker page used when `NOTION_TRACKER_PAGE_ID` is not set.
pub const DEFAULT_PAGE_ID: &str = "2e40a3f50f2380d9bc25cd131c02bcd5";

const DEFAULT_PROMPT_HOUR: u32 = 21;
const DEFAULT_CONFIRM_TTL_SECS: u64 = 900;
const DEFAULT_STATE_DIR: &str = ".moodsheet";
const CONFIG_SUBDIR: &str = "config";

/// Get the config directory.
///
/// Defaults to `~/.moodsheet/config/` or `MOODSHEET_CONFIG_DIR` env var.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                .join(CONFIG_SUBDIR)
        })
}

/// Get the `.env.local` file path inside a config directory.
pub fn env_file_in(dir: &Path) -> PathBuf {
    dir.join(".env.local")
}

/// Get the `.env.local` file path in the default config directory.
pub fn env_file() -> PathBuf {
    env_file_in(&config_dir())
}

/// Load env files without overriding variables already set.
///
/// The config directory's `.env.local` wins over a local `.env.local` or
/// `.env` in the working directory. Returns the files that were loaded.
pub fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    let path = env_file();
    if path.exists() {
        match dotenvy::from_path(&path) {
            Ok(()) => loaded.push(path),
            Err(e) => debug!(error = %e, path = %path.display(), "Failed to load env file"),
        }
    }

    if let Ok(path) = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv()) {
        loaded.push(path);
    }

    loaded
}

/// Runtime configuration for the bot.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub bot_token: String,
    pub notion_token: String,
    /// Destination for the scheduled prompt; `None` disables it.
    pub group_chat_id: Option<i64>,
    pub page_id: String,
    /// Local wall-clock time of the daily prompt.
    pub prompt_time: NaiveTime,
    /// How long an overwrite confirmation stays valid.
    pub confirm_ttl: Duration,
}

impl TrackerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get(BOT_TOKEN_ENV).ok_or(ConfigError::MissingEnv(BOT_TOKEN_ENV))?;
        let notion_token =
            get(NOTION_TOKEN_ENV).ok_or(ConfigError::MissingEnv(NOTION_TOKEN_ENV))?;

        let group_chat_id = match get(GROUP_CHAT_ID_ENV) {
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                name: GROUP_CHAT_ID_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let page_id = get(PAGE_ID_ENV).unwrap_or_else(|| DEFAULT_PAGE_ID.to_string());

        let prompt_time = match get(PROMPT_TIME_ENV) {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| {
                ConfigError::InvalidValue {
                    name: PROMPT_TIME_ENV,
                    value: raw.clone(),
                    reason: "expected HH:MM".to_string(),
                }
            })?,
            None => default_prompt_time(),
        };

        let confirm_ttl = match get(CONFIRM_TTL_ENV) {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue {
                    name: CONFIRM_TTL_ENV,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => Duration::from_secs(DEFAULT_CONFIRM_TTL_SECS),
        };

        Ok(Self {
            bot_token,
            notion_token,
            group_chat_id,
            page_id,
            prompt_time,
            confirm_ttl,
        })
    }
}

fn default_prompt_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_PROMPT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}
