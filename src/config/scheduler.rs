//! Scheduler and simulated-work configuration structures.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_MAX_RETRIES;

/// Prefix of every environment variable read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "TASK_SCHEDULER_";

/// Parameters of the placeholder work performed for each task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Shortest simulated run, in milliseconds.
    pub min_duration_ms: u64,
    /// Longest simulated run, in milliseconds.
    pub max_duration_ms: u64,
    /// Probability in `[0, 1]` that a run fails.
    pub failure_rate: f64,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 1_000,
            max_duration_ms: 5_000,
            failure_rate: 0.1,
        }
    }
}

impl WorkConfig {
    /// Validate duration bounds and failure rate.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_duration_ms > self.max_duration_ms {
            return Err(format!(
                "min_duration_ms ({}) must not exceed max_duration_ms ({})",
                self.min_duration_ms, self.max_duration_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(format!(
                "failure_rate must be within [0, 1], got {}",
                self.failure_rate
            ));
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Dispatcher period in milliseconds.
    pub tick_interval_ms: u64,
    /// Maximum number of tasks running at once.
    pub max_concurrency: usize,
    /// `max_retries` given to tasks created without one.
    pub default_max_retries: u32,
    /// Put a read-through cache in front of the store.
    pub cache_enabled: bool,
    /// How long shutdown waits for running work before aborting it.
    pub shutdown_grace_ms: u64,
    /// Simulated work parameters.
    pub work: WorkConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            max_concurrency: 10,
            default_max_retries: DEFAULT_MAX_RETRIES,
            cache_enabled: false,
            shutdown_grace_ms: 5_000,
            work: WorkConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate every field.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        self.work.validate().map_err(|e| format!("work invalid: {e}"))
    }

    /// Parse scheduler configuration from a JSON string and validate.
    /// Missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `TASK_SCHEDULER_*` variables, after loading a
    /// `.env` file if one is present.
    ///
    /// Recognized suffixes: `TICK_INTERVAL_MS`, `MAX_CONCURRENCY`,
    /// `DEFAULT_MAX_RETRIES`, `CACHE_ENABLED`, `SHUTDOWN_GRACE_MS`,
    /// `WORK_MIN_DURATION_MS`, `WORK_MAX_DURATION_MS`, `WORK_FAILURE_RATE`.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`SchedulerConfig::from_env`] but reading variables through
    /// `lookup`, which receives the full variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        override_with(&mut cfg.tick_interval_ms, "TICK_INTERVAL_MS", get("TICK_INTERVAL_MS"))?;
        override_with(&mut cfg.max_concurrency, "MAX_CONCURRENCY", get("MAX_CONCURRENCY"))?;
        override_with(
            &mut cfg.default_max_retries,
            "DEFAULT_MAX_RETRIES",
            get("DEFAULT_MAX_RETRIES"),
        )?;
        override_with(&mut cfg.cache_enabled, "CACHE_ENABLED", get("CACHE_ENABLED"))?;
        override_with(&mut cfg.shutdown_grace_ms, "SHUTDOWN_GRACE_MS", get("SHUTDOWN_GRACE_MS"))?;
        override_with(
            &mut cfg.work.min_duration_ms,
            "WORK_MIN_DURATION_MS",
            get("WORK_MIN_DURATION_MS"),
        )?;
        override_with(
            &mut cfg.work.max_duration_ms,
            "WORK_MAX_DURATION_MS",
            get("WORK_MAX_DURATION_MS"),
        )?;
        override_with(
            &mut cfg.work.failure_rate,
            "WORK_FAILURE_RATE",
            get("WORK_FAILURE_RATE"),
        )?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Dispatcher period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn override_with<T>(slot: &mut T, suffix: &str, raw: Option<String>) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = raw {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_PREFIX}{suffix}: cannot parse `{raw}`: {e}"))?;
    }
    Ok(())
}
