//! Kernel configuration with environment overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors. These are programmer errors surfaced at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}

/// Configuration for the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempt ceiling for jobs that do not set their own.
    pub default_max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: 3,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_attempts == 0 {
            return Err(ConfigError::invalid(
                "default_max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum number of history records retained.
    pub history_capacity: usize,
    /// Records returned by `history(None)`.
    pub default_history_window: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            default_history_window: 10,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::invalid("history_capacity", "must be at least 1"));
        }
        if self.default_history_window == 0 {
            return Err(ConfigError::invalid(
                "default_history_window",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of sessions created without an explicit TTL.
    pub default_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
        }
    }
}

impl SessionConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::invalid("default_ttl_secs", "must be at least 1"));
        }
        Ok(())
    }
}

/// Top-level configuration for a [`crate::Kernel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub queue: QueueConfig,
    pub bus: BusConfig,
    pub sessions: SessionConfig,
    /// Publish a `JobEvent` on the bus for every job transition.
    pub publish_job_events: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            bus: BusConfig::default(),
            sessions: SessionConfig::default(),
            publish_job_events: true,
        }
    }
}

impl KernelConfig {
    /// Build a config from defaults overridden by environment variables.
    ///
    /// - `KERNEL_MAX_ATTEMPTS` (default: 3)
    /// - `KERNEL_HISTORY_CAPACITY` (default: 1000)
    /// - `KERNEL_HISTORY_WINDOW` (default: 10)
    /// - `KERNEL_SESSION_TTL_SECS` (default: 3600)
    /// - `KERNEL_PUBLISH_JOB_EVENTS` (`true`/`false`, default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`KernelConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| lookup(name).and_then(non_empty).map(|v| (name, v));
        let mut cfg = Self::default();

        if let Some((name, v)) = read("KERNEL_MAX_ATTEMPTS") {
            cfg.queue.default_max_attempts = parse_number(name, &v)?;
        }
        if let Some((name, v)) = read("KERNEL_HISTORY_CAPACITY") {
            cfg.bus.history_capacity = parse_number(name, &v)?;
        }
        if let Some((name, v)) = read("KERNEL_HISTORY_WINDOW") {
            cfg.bus.default_history_window = parse_number(name, &v)?;
        }
        if let Some((name, v)) = read("KERNEL_SESSION_TTL_SECS") {
            cfg.sessions.default_ttl_secs = parse_number(name, &v)?;
        }
        if let Some((name, v)) = read("KERNEL_PUBLISH_JOB_EVENTS") {
            cfg.publish_job_events = parse_bool(name, &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        self.bus.validate()?;
        self.sessions.validate()
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::invalid(name, format!("{value:?}: {e}")))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(ConfigError::invalid(
            name,
            format!("{value:?} (expected true/false)"),
        )),
    }
}
