//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Runs kept by a dispatcher unless configured otherwise.
pub const DEFAULT_RETAINED_RUNS: usize = 8;

/// Settings for a [`Dispatcher`](crate::execution::Dispatcher).
///
/// Deserializes from JSON with every field optional:
///
/// ```rust
/// use trellis_core::DispatcherConfig;
///
/// let config = DispatcherConfig::from_json(r#"{"run_timeout_ms": 250}"#).unwrap();
/// assert_eq!(config.run_timeout(), Some(std::time::Duration::from_millis(250)));
/// assert_eq!(config.retained_runs(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Upper bound on one run, in milliseconds. `None` waits forever.
    pub run_timeout_ms: Option<u64>,

    /// How many runs the dispatcher keeps addressable by trigger.
    pub retained_runs: usize,
}

impl DispatcherConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_retained_runs(mut self, runs: usize) -> Self {
        self.retained_runs = runs;
        self
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn retained_runs(&self) -> usize {
        self.retained_runs
    }

    pub fn validate(&self) -> Result<()> {
        if self.retained_runs == 0 {
            return Err(Error::InvalidConfig(
                "retained_runs must be at least 1".into(),
            ));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "run_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            run_timeout_ms: None,
            retained_runs: DEFAULT_RETAINED_RUNS,
        }
    }
}
