//! TOML-based application configuration.
//!
//! Stores preferences that shape the session controller:
//! - Default sleep goal and auto-wake floor
//! - Chat keywords that cancel a session
//! - Wake notification content
//! - Delays of the UI signals raised after a session ends
//!
//! Configuration is stored at `<data dir>/config.toml`. The live sleep goal
//! itself is user data and lives in the database, not here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::session::validate_sleep_goal;

/// Longest delay accepted for a post-session signal.
pub const MAX_SIGNAL_DELAY_MS: u64 = 60_000;

/// Session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Goal used when none is stored, and restored by delete-all.
    #[serde(default = "default_sleep_goal_hours")]
    pub default_sleep_goal_hours: f64,
    /// Foregrounding never auto-completes a session younger than this.
    #[serde(default = "default_auto_wake_minimum_minutes")]
    pub auto_wake_minimum_minutes: u32,
    /// Chat messages containing any of these end the session.
    #[serde(default = "default_cancel_keywords")]
    pub cancel_keywords: Vec<String>,
    #[serde(default = "default_welcome_prompt")]
    pub welcome_prompt: String,
}

/// Wake notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_notification_title")]
    pub title: String,
    #[serde(default = "default_notification_body")]
    pub body: String,
}

/// Delays of the signals raised after a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    #[serde(default = "default_review_prompt_delay_ms")]
    pub review_prompt_delay_ms: u64,
    #[serde(default = "default_dismiss_delay_ms")]
    pub dismiss_delay_ms: u64,
}

/// Record list presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub records: RecordsConfig,
}

// Default functions
fn default_sleep_goal_hours() -> f64 {
    8.0
}
fn default_auto_wake_minimum_minutes() -> u32 {
    60
}
fn default_cancel_keywords() -> Vec<String> {
    vec!["cancel".into(), "취소".into()]
}
fn default_welcome_prompt() -> String {
    "Can't sleep tonight... what are you up to?".into()
}
fn default_true() -> bool {
    true
}
fn default_notification_title() -> String {
    "Good morning!".into()
}
fn default_notification_body() -> String {
    "Jarago is ready to record your wake-up time.".into()
}
fn default_review_prompt_delay_ms() -> u64 {
    500
}
fn default_dismiss_delay_ms() -> u64 {
    1000
}
fn default_recent_limit() -> usize {
    7
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_sleep_goal_hours: default_sleep_goal_hours(),
            auto_wake_minimum_minutes: default_auto_wake_minimum_minutes(),
            cancel_keywords: default_cancel_keywords(),
            welcome_prompt: default_welcome_prompt(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_notification_title(),
            body: default_notification_body(),
        }
    }
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            review_prompt_delay_ms: default_review_prompt_delay_ms(),
            dismiss_delay_ms: default_dismiss_delay_ms(),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default configuration: {e}");
            Self::default()
        })
    }

    /// Reject values the controller cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = validate_sleep_goal(self.session.default_sleep_goal_hours) {
            return Err(ConfigError::InvalidValue {
                key: "session.default_sleep_goal_hours".into(),
                message: e.to_string(),
            });
        }
        for (key, delay) in [
            ("signals.review_prompt_delay_ms", self.signals.review_prompt_delay_ms),
            ("signals.dismiss_delay_ms", self.signals.dismiss_delay_ms),
        ] {
            if delay > MAX_SIGNAL_DELAY_MS {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be at most {MAX_SIGNAL_DELAY_MS} ms, got {delay}"),
                });
            }
        }
        if self.records.recent_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "records.recent_limit".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or fails validation. On error `self` is unchanged.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Whether `text` contains one of the cancel keywords, ignoring case.
    pub fn is_cancel_message(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.session
            .cancel_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .any(|k| lowered.contains(&k.to_lowercase()))
    }
}
