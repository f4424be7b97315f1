//! TOML-based application configuration.
//!
//! Stores:
//! - planner constraints and the default horizon,
//! - narrative provider settings and retry schedule.
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::narrative::openai::{OpenAiSettings, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::narrative::{CachedAnnotator, DisabledAnnotator, NarrativeAnnotator, OpenAiAnnotator, RetryPolicy};
use crate::schedule::{Workdays, MAX_HORIZON_DAYS};
use crate::scheduler::{PlanConstraints, PlanRequest, DEFAULT_HORIZON_DAYS};

/// Planner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_max_contexts")]
    pub max_contexts_per_day: u32,
    #[serde(default = "default_max_focus_blocks")]
    pub max_focus_blocks_per_day: u32,
    #[serde(default = "default_buffer_ratio")]
    pub buffer_ratio: f64,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub workdays: Workdays,
}

/// Narrative provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

// Default functions
fn default_max_contexts() -> u32 {
    PlanConstraints::default().max_contexts_per_day
}

fn default_max_focus_blocks() -> u32 {
    PlanConstraints::default().max_focus_blocks_per_day
}

fn default_buffer_ratio() -> f64 {
    PlanConstraints::default().buffer_ratio
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_base_delay_ms() -> u64 {
    RetryPolicy::default().base_delay.as_millis() as u64
}

fn default_max_delay_ms() -> u64 {
    RetryPolicy::default().max_delay.as_millis() as u64
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_contexts_per_day: default_max_contexts(),
            max_focus_blocks_per_day: default_max_focus_blocks(),
            buffer_ratio: default_buffer_ratio(),
            horizon_days: default_horizon_days(),
            workdays: Workdays::default(),
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl PlannerConfig {
    pub fn constraints(&self) -> PlanConstraints {
        PlanConstraints::new()
            .with_max_contexts(self.max_contexts_per_day)
            .with_max_focus_blocks(self.max_focus_blocks_per_day)
            .with_buffer_ratio(self.buffer_ratio)
    }

    /// Plan request starting at `start` with the configured defaults.
    pub fn request(&self, start: NaiveDate) -> PlanRequest {
        PlanRequest::new(start)
            .with_days(self.horizon_days)
            .with_workdays(self.workdays.clone())
            .with_constraints(self.constraints())
    }
}

impl NarrativeConfig {
    pub fn settings(&self) -> OpenAiSettings {
        OpenAiSettings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature as f32,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    /// The configured annotator, or [`DisabledAnnotator`] when narrative is
    /// off or the API key is missing.
    pub fn annotator(&self) -> Box<dyn NarrativeAnnotator> {
        if !self.enabled {
            return Box::new(DisabledAnnotator);
        }
        match OpenAiAnnotator::from_env(&self.api_key_env, self.settings()) {
            Ok(annotator) => Box::new(CachedAnnotator::new(annotator)),
            Err(e) => {
                tracing::warn!(var = %self.api_key_env, "narrative disabled: {e}");
                Box::new(DisabledAnnotator)
            }
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
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
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
        Err(unknown())
    }

    /// `config.toml` inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
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
            }),
        }
    }

    /// Like [`Config::load`], falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("using default configuration: {e}");
            Self::default()
        })
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Reject values the planner or narrative layer cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner
            .constraints()
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "planner".into(),
                message: e.to_string(),
            })?;
        if !(1..=MAX_HORIZON_DAYS).contains(&self.planner.horizon_days) {
            return Err(ConfigError::InvalidValue {
                key: "planner.horizon_days".into(),
                message: format!("must be between 1 and {MAX_HORIZON_DAYS}"),
            });
        }
        if self.planner.workdays.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "planner.workdays".into(),
                message: "must contain at least one weekday".into(),
            });
        }
        if !self.narrative.temperature.is_finite() || self.narrative.temperature < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "narrative.temperature".into(),
                message: "must be a non-negative number".into(),
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

    /// Set a value by dotted key without saving.
    ///
    /// # Errors
    /// Unknown keys, unparsable values, and values that fail validation are
    /// rejected and leave `self` unchanged.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by dotted key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }
}
