//! Engine configuration
//!
//! [`ReactiveConfig`] controls the defaults a property factory applies:
//! the debounce window used when a caller does not pass one, the upper bound on
//! any debounce window, how notifications are delivered, and whether each round
//! gets its own tracing span.
//!
//! Configuration is layered: defaults, then a TOML file, then `RILL_*`
//! environment variables, then validation.
//!
//! ```toml
//! default_debounce_ms = 0
//! max_debounce_ms = 60000
//! notification = "serial"
//! trace_rounds = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, RillError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RILL_";

/// How a property delivers its set/changed notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Synchronously, in the context of the caller of `set`.
    #[default]
    Inline,
    /// On a dedicated task, one notification at a time, in order.
    Serial,
}

impl std::str::FromStr for NotificationMode {
    type Err = RillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "serial" => Ok(Self::Serial),
            other => Err(RillError::config(format!(
                "unknown notification mode '{other}' (expected 'inline' or 'serial')"
            ))),
        }
    }
}

/// Configuration for a property factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReactiveConfig {
    /// Debounce window applied when an async property is created without one.
    pub default_debounce_ms: u64,
    /// Largest debounce window a property may request.
    pub max_debounce_ms: u64,
    /// Notification delivery for properties built by the factory.
    pub notification: NotificationMode,
    /// Emit a tracing span per calculation round.
    pub trace_rounds: bool,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: 0,
            max_debounce_ms: 60_000,
            notification: NotificationMode::Inline,
            trace_rounds: false,
        }
    }
}

impl ReactiveConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RillError::config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `RILL_*` overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `RILL_*` overrides from an explicit variable list.
    ///
    /// `RILL_DEFAULT_DEBOUNCE_MS` maps to `default_debounce_ms`, and so on.
    /// Variables without the prefix are ignored.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) {
                self.set_from_string(&name.to_ascii_lowercase(), value.as_ref())?;
            }
        }
        Ok(())
    }

    /// Set a single field by name.
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "default_debounce_ms" => self.default_debounce_ms = parse_u64(key, value)?,
            "max_debounce_ms" => self.max_debounce_ms = parse_u64(key, value)?,
            "notification" => self.notification = value.parse()?,
            "trace_rounds" => {
                self.trace_rounds = value.trim().parse().map_err(|_| {
                    RillError::config(format!("{key} expects true or false, got '{value}'"))
                })?;
            }
            other => {
                tracing::warn!(key = other, "ignoring unknown configuration key");
            }
        }
        Ok(())
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.default_debounce_ms > self.max_debounce_ms {
            return Err(RillError::config(format!(
                "default_debounce_ms ({}) exceeds max_debounce_ms ({})",
                self.default_debounce_ms, self.max_debounce_ms
            )));
        }
        Ok(())
    }

    /// The default debounce window.
    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.default_debounce_ms)
    }

    /// The largest permitted debounce window.
    pub fn max_debounce(&self) -> Duration {
        Duration::from_millis(self.max_debounce_ms)
    }

    /// Resolve a requested debounce window against the configured bounds.
    pub fn resolve_debounce(&self, requested: Option<Duration>) -> Result<Duration> {
        let debounce = requested.unwrap_or_else(|| self.default_debounce());
        if debounce > self.max_debounce() {
            return Err(RillError::invalid(format!(
                "debounce window {debounce:?} exceeds the configured maximum {:?}",
                self.max_debounce()
            )));
        }
        Ok(debounce)
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| RillError::config(format!("{key} expects an integer, got '{value}'")))
}
