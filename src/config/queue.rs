//! Admission queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::duration;

/// Environment variable for [`QueueConfig::max_active`].
pub const ENV_MAX_ACTIVE: &str = "REPORT_QUEUE_MAX_ACTIVE";
/// Environment variable for [`QueueConfig::max_size`].
pub const ENV_MAX_SIZE: &str = "REPORT_QUEUE_MAX_SIZE";
/// Environment variable for [`QueueConfig::timeout`].
pub const ENV_TIMEOUT: &str = "REPORT_QUEUE_TIMEOUT";
/// Environment variable for [`QueueConfig::sweep_interval`].
pub const ENV_SWEEP_INTERVAL: &str = "REPORT_QUEUE_SWEEP_INTERVAL";

const DEFAULT_MAX_ACTIVE: usize = 5;
const DEFAULT_MAX_SIZE: usize = 100;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Limits and cadence for the admission queue.
///
/// The scheduler takes its own copy at construction; later changes to a
/// config value never affect a running scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Hard cap on reports dispatched to the analysis service at once.
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    /// Hard cap on reports waiting for a free slot.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// How long a dispatched report may stay active before it is reclaimed.
    #[serde(default = "default_timeout", with = "duration")]
    pub timeout: Duration,
    /// Cadence of the sweeper.
    #[serde(default = "default_sweep_interval", with = "duration")]
    pub sweep_interval: Duration,
}

const fn default_max_active() -> usize {
    DEFAULT_MAX_ACTIVE
}

const fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

const fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_active: DEFAULT_MAX_ACTIVE,
            max_size: DEFAULT_MAX_SIZE,
            timeout: DEFAULT_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl QueueConfig {
    /// Set the active slot limit.
    #[must_use]
    pub const fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    /// Set the pending buffer limit.
    #[must_use]
    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the active entry timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sweeper cadence.
    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first zero-valued field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_active == 0 {
            return Err("max_active must be greater than 0".into());
        }
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".into());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".into());
        }
        if self.sweep_interval.is_zero() {
            return Err("sweep_interval must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse queue configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, an
    /// unreadable `.env` file, or an invalid resulting configuration.
    pub fn from_env() -> Result<Self, String> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => return Err(format!("env file error: {e}")),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`QueueConfig::from_env`], minus the `.env` handling.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_MAX_ACTIVE) {
            cfg.max_active = parse_count(ENV_MAX_ACTIVE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_SIZE) {
            cfg.max_size = parse_count(ENV_MAX_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            cfg.timeout = duration::parse(&raw).map_err(|e| format!("{ENV_TIMEOUT}: {e}"))?;
        }
        if let Some(raw) = lookup(ENV_SWEEP_INTERVAL) {
            cfg.sweep_interval =
                duration::parse(&raw).map_err(|e| format!("{ENV_SWEEP_INTERVAL}: {e}"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: invalid count `{raw}`: {e}"))
}
