use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, path::PathBuf};

use crate::error::{DigestError, Result};

pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";
pub const CHANNEL_ENV: &str = "TELEGRAM_CHANNEL_ID";

/// Fixed point the forecast is requested for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

fn default_latitude() -> f64 {
    50.4547
}

fn default_longitude() -> f64 {
    30.5238
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { latitude: default_latitude(), longitude: default_longitude() }
    }
}

/// Forecast endpoint and report window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Open-Meteo API base URL, without the `/forecast` path.
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_past_days")]
    pub past_days: u8,

    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Number of trailing hourly rows shown in the report.
    #[serde(default = "default_rows")]
    pub rows: usize,
}

fn default_forecast_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_timezone() -> String {
    "auto".to_string()
}

const fn default_past_days() -> u8 {
    1
}

const fn default_forecast_days() -> u8 {
    1
}

const fn default_rows() -> usize {
    10
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            timezone: default_timezone(),
            past_days: default_past_days(),
            forecast_days: default_forecast_days(),
            rows: default_rows(),
        }
    }
}

/// Retry and cache policy for the forecast HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpPolicy {
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before retry `k` is `backoff_factor_secs * 2^(k-1)`.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor_secs: f64,

    /// Cached responses older than this are refetched. `0` disables the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Overrides the platform cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_backoff_factor() -> f64 {
    0.2
}

const fn default_cache_ttl() -> u64 {
    3600
}

const fn default_timeout() -> u64 {
    30
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_factor_secs: default_backoff_factor(),
            cache_ttl_secs: default_cache_ttl(),
            timeout_secs: default_timeout(),
            cache_dir: None,
        }
    }
}

/// Bot credentials and destination channel.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { api_base: default_telegram_api_base(), bot_token: None, channel_id: None }
    }
}

// Keeps the bot token out of logs and panic messages.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [location]
/// latitude = 50.4547
/// longitude = 30.5238
///
/// [telegram]
/// bot_token = "..."
/// channel_id = "@my_channel"
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub http: HttpPolicy,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load config from the platform path, or defaults if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|source| DigestError::Io { path: path.to_path_buf(), source })?;

        toml::from_str(&contents)
            .map_err(|source| DigestError::ConfigParse { path: path.to_path_buf(), source })
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| DigestError::Io { path: parent.to_path_buf(), source })?;
        }

        let toml = toml::to_string_pretty(self)?;

        fs::write(path, toml).map_err(|source| DigestError::Io { path: path.to_path_buf(), source })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast-digest", "forecast-digest").ok_or_else(|| {
            DigestError::Config("Could not determine platform config directory".to_string())
        })
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for cached forecast responses.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.http.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    /// Override Telegram credentials from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(channel) = lookup(CHANNEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram.channel_id = Some(channel);
        }
    }

    /// Convenience helper: set/replace the bot credentials.
    pub fn upsert_telegram(&mut self, bot_token: String, channel_id: String) {
        self.telegram.bot_token = Some(bot_token);
        self.telegram.channel_id = Some(channel_id);
    }

    pub fn is_telegram_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.telegram.bot_token) && set(&self.telegram.channel_id)
    }

    /// Range checks for everything except the Telegram credentials, which are
    /// checked when the notifier is built.
    pub fn validate(&self) -> Result<()> {
        let LocationConfig { latitude, longitude } = self.location;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DigestError::Config(format!(
                "Invalid coordinates ({latitude}, {longitude}): latitude must be -90 to 90, \
                 longitude must be -180 to 180"
            )));
        }
        if self.forecast.rows == 0 {
            return Err(DigestError::Config("forecast.rows must be at least 1".to_string()));
        }
        if self.forecast.past_days > 92 {
            return Err(DigestError::Config("forecast.past_days must be 0..=92".to_string()));
        }
        if !(1..=16).contains(&self.forecast.forecast_days) {
            return Err(DigestError::Config("forecast.forecast_days must be 1..=16".to_string()));
        }
        if self.http.max_attempts == 0 {
            return Err(DigestError::Config("http.max_attempts must be at least 1".to_string()));
        }
        if !self.http.backoff_factor_secs.is_finite() || self.http.backoff_factor_secs < 0.0 {
            return Err(DigestError::Config(
                "http.backoff_factor_secs must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
