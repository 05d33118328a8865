//! Scheduler parameters and configuration file support for Recall.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/recall/config.toml`.

use crate::scheduler::MAX_SCHEDULABLE_DAYS;
use crate::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Parameters read by every review
///
/// The record form requires every field; step durations are stored as
/// whole seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delays between presentations of a new card
    #[serde(with = "step_seconds")]
    pub learning_steps: Vec<Duration>,

    /// Days until the next review after Good on the last learning step
    pub graduating_interval: u32,

    /// Days until the next review after Easy on a learning card
    pub easy_interval: u32,

    /// Delays between presentations of a lapsed card
    #[serde(with = "step_seconds")]
    pub relearning_steps: Vec<Duration>,

    /// Lower bound in days for the interval after a lapse
    pub minimum_interval: u32,

    /// Upper bound in days for any review interval
    pub maximum_interval: u32,

    /// Ease given to a card when it first graduates
    pub starting_ease: f64,

    /// Extra interval multiplier for Easy on review cards
    pub easy_bonus: f64,

    /// Global interval multiplier
    pub interval_modifier: f64,

    /// Interval multiplier for Hard on review cards
    pub hard_interval: f64,

    /// Interval multiplier applied on a lapse
    pub new_interval: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            learning_steps: vec![Duration::minutes(1), Duration::minutes(10)],
            graduating_interval: 1,
            easy_interval: 4,
            relearning_steps: vec![Duration::minutes(10)],
            minimum_interval: 1,
            maximum_interval: 36500,
            starting_ease: 2.5,
            easy_bonus: 1.3,
            interval_modifier: 1.0,
            hard_interval: 1.2,
            new_interval: 0.0,
        }
    }
}

impl SchedulerConfig {
    /// Report parameter combinations that schedule cards oddly
    ///
    /// Findings are advisory; the scheduler accepts any configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, steps) in [
            ("learning_steps", &self.learning_steps),
            ("relearning_steps", &self.relearning_steps),
        ] {
            for (idx, step) in steps.iter().enumerate() {
                if *step <= Duration::zero() {
                    errors.push(format!("{}[{}] must be positive", name, idx));
                } else if *step > Duration::days(i64::from(MAX_SCHEDULABLE_DAYS)) {
                    errors.push(format!(
                        "{}[{}] is longer than {} days and cannot be scheduled",
                        name, idx, MAX_SCHEDULABLE_DAYS
                    ));
                }
            }
        }

        for (name, days) in [
            ("graduating_interval", self.graduating_interval),
            ("easy_interval", self.easy_interval),
            ("minimum_interval", self.minimum_interval),
            ("maximum_interval", self.maximum_interval),
        ] {
            if days > MAX_SCHEDULABLE_DAYS {
                errors.push(format!(
                    "{} {} is longer than {} days and cannot be scheduled",
                    name, days, MAX_SCHEDULABLE_DAYS
                ));
            }
        }

        if self.minimum_interval > self.maximum_interval {
            errors.push(format!(
                "minimum_interval {} exceeds maximum_interval {}",
                self.minimum_interval, self.maximum_interval
            ));
        }

        if self.graduating_interval == 0 {
            errors.push("graduating_interval must be at least 1 day".to_string());
        }

        if self.easy_interval < self.graduating_interval {
            errors.push(format!(
                "easy_interval {} is shorter than graduating_interval {}",
                self.easy_interval, self.graduating_interval
            ));
        }

        if self.starting_ease < 1.3 {
            errors.push(format!(
                "starting_ease {} is below the ease floor 1.3",
                self.starting_ease
            ));
        }

        for (name, value) in [
            ("easy_bonus", self.easy_bonus),
            ("interval_modifier", self.interval_modifier),
            ("hard_interval", self.hard_interval),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{} must be a positive number, got {}", name, value));
            }
        }

        if !(self.new_interval.is_finite() && self.new_interval >= 0.0) {
            errors.push(format!(
                "new_interval must be non-negative, got {}",
                self.new_interval
            ));
        }

        errors
    }

    /// Serialize to a flat JSON object
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a flat JSON object
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::MalformedRecord(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedRecord(e.to_string()))
    }
}

/// Step durations as whole seconds
mod step_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(steps: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        let seconds: Vec<i64> = steps.iter().map(|step| step.num_seconds()).collect();
        seconds.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        let seconds = Vec::<i64>::deserialize(deserializer)?;
        seconds
            .into_iter()
            .map(|secs| {
                Duration::try_seconds(secs)
                    .ok_or_else(|| {
                        <D::Error as serde::de::Error>::custom(format!(
                            "step of {} seconds is out of range",
                            secs
                        ))
                    })
            })
            .collect()
    }
}

/// Random source settings
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FuzzConfig {
    /// Seed for reproducible interval fuzzing (None = OS entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub fuzz: FuzzConfig,
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);

        for finding in config.scheduler.validate() {
            tracing::warn!("Scheduler config: {}", finding);
        }

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME").map_err(|_| {
                    Error::Config("Neither a config directory nor HOME is available".into())
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("recall").join("config.toml"))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = self.to_toml()?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}
