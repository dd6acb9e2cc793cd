//! Runtime configuration.
//!
//! Limits for the runaway-update guard and the tick driver. A configuration
//! is installed per execution context with [`Runtime::configure`].
//!
//! [`Runtime::configure`]: crate::reactive::Runtime::configure

use serde::{Deserialize, Serialize};

/// Default number of untracked writes allowed per cell per window
const DEFAULT_MAX_UNTRACKED_UPDATES: u32 = 10;
/// Default rate window: one second
const DEFAULT_UNTRACKED_WINDOW_MS: u64 = 1_000;
/// Default bound on ticks run by a single drain
const DEFAULT_MAX_TICKS_PER_DRAIN: usize = 1_000;

/// Reactive runtime configuration
///
/// # Examples
///
/// ```
/// use ripple_core::config::RuntimeConfig;
///
/// let config = RuntimeConfig::default().with_max_untracked_updates(20);
/// assert_eq!(config.max_untracked_updates(), 20);
/// assert_eq!(config.untracked_window_ms(), 1_000);
///
/// let parsed = RuntimeConfig::from_json(r#"{ "untracked_window_ms": 250 }"#).unwrap();
/// assert_eq!(parsed.untracked_window_ms(), 250);
/// assert_eq!(parsed.max_untracked_updates(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    max_untracked_updates: u32,
    untracked_window_ms: u64,
    max_ticks_per_drain: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_untracked_updates: DEFAULT_MAX_UNTRACKED_UPDATES,
            untracked_window_ms: DEFAULT_UNTRACKED_WINDOW_MS,
            max_ticks_per_drain: DEFAULT_MAX_TICKS_PER_DRAIN,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn with_max_untracked_updates(mut self, limit: u32) -> Self {
        self.max_untracked_updates = limit;
        self
    }

    pub fn with_untracked_window_ms(mut self, window_ms: u64) -> Self {
        self.untracked_window_ms = window_ms;
        self
    }

    pub fn with_max_ticks_per_drain(mut self, ticks: usize) -> Self {
        self.max_ticks_per_drain = ticks;
        self
    }

    pub fn max_untracked_updates(&self) -> u32 {
        self.max_untracked_updates
    }

    pub fn untracked_window_ms(&self) -> u64 {
        self.untracked_window_ms
    }

    pub fn max_ticks_per_drain(&self) -> usize {
        self.max_ticks_per_drain
    }
}
