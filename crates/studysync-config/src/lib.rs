use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://studysync.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("Cannot locate home directory")]
    NoHomeDir,
}

/// What group creation does with a session that runs past midnight.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MidnightPolicy {
    /// Refuse the group.
    #[default]
    Reject,
    /// Accept and store the wrapped clock time as the end.
    Wrap,
}

impl std::str::FromStr for MidnightPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MidnightPolicy::Reject),
            "wrap" => Ok(MidnightPolicy::Wrap),
            _ => Err(ConfigError::InvalidValue {
                key: "schedule.midnight_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Bounded exponential backoff for transient commit failures.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 25,
            max_delay_ms: 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RatingConfig {
    /// How long after submission a rating may still be edited (once).
    pub edit_window_secs: u64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            edit_window_secs: 24 * 60 * 60,
        }
    }
}

impl RatingConfig {
    pub fn edit_window(&self) -> Duration {
        Duration::from_secs(self.edit_window_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ScheduleConfig {
    pub midnight_policy: MidnightPolicy,
}

/// Settings stored in ~/.studysync/config.json
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub retry: RetryConfig,
    pub ratings: RatingConfig,
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            retry: RetryConfig::default(),
            ratings: RatingConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Config {
    /// File at `path` (defaults if it does not exist), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a file. A missing file yields the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read(e)),
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// ~/.studysync/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join(".studysync")
            .join("config.json"))
    }

    /// Apply `STUDYSYNC_*` overrides looked up through `lookup`.
    ///
    /// `STUDYSYNC_DATABASE_URL` wins over the conventional `DATABASE_URL`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STUDYSYNC_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database_url = url;
        }
        if let Some(v) = lookup("STUDYSYNC_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_number("STUDYSYNC_RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("STUDYSYNC_RETRY_BASE_DELAY_MS") {
            self.retry.base_delay_ms = parse_number("STUDYSYNC_RETRY_BASE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("STUDYSYNC_RETRY_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parse_number("STUDYSYNC_RETRY_MAX_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("STUDYSYNC_RATING_EDIT_WINDOW_SECS") {
            self.ratings.edit_window_secs = parse_number("STUDYSYNC_RATING_EDIT_WINDOW_SECS", &v)?;
        }
        if let Some(v) = lookup("STUDYSYNC_MIDNIGHT_POLICY") {
            self.schedule.midnight_policy = v.parse()?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "retry.base_delay_ms".to_string(),
                value: self.retry.base_delay_ms.to_string(),
            });
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database_url".to_string(),
                value: String::new(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
