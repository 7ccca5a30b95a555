//! Configuration loading and management.

use std::path::{Path, PathBuf};

use dwell_core::{
    DEFAULT_CHECK_CALLBACKS_INTERVAL_MS, DEFAULT_IDLE_TIMEOUT_MS, DwellConfig,
};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Silence before the session pauses, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Poller tick period in milliseconds.
    pub check_callbacks_interval_ms: u64,

    /// One-shot triggers.
    pub absolute: Vec<AbsoluteSpec>,

    /// Repeating triggers.
    pub interval: Vec<IntervalSpec>,
}

/// A one-shot trigger declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsoluteSpec {
    /// Elapsed active time at which the trigger fires.
    pub at_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A repeating trigger declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSpec {
    /// First threshold.
    pub start_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// How the threshold moves after each firing.
    #[serde(default)]
    pub growth: Growth,
}

/// Growth function of an interval trigger.
///
/// In TOML: `growth = "constant"`, `growth = { linear = 5000 }` or
/// `growth = { multiply = 2 }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Growth {
    /// Threshold never moves: fires on every tick once reached.
    #[default]
    Constant,
    /// Adds a fixed step.
    Linear(u64),
    /// Multiplies by a factor.
    Multiply(u64),
}

impl Growth {
    pub const fn next(self, threshold_ms: u64) -> u64 {
        match self {
            Self::Constant => threshold_ms,
            Self::Linear(step) => threshold_ms.saturating_add(step),
            Self::Multiply(factor) => threshold_ms.saturating_mul(factor),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            check_callbacks_interval_ms: DEFAULT_CHECK_CALLBACKS_INTERVAL_MS,
            absolute: Vec::new(),
            interval: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (DWELL_*)
        figment = figment.merge(Env::prefixed("DWELL_"));

        figment.extract()
    }

    /// The engine timing knobs.
    pub const fn tracker(&self) -> DwellConfig {
        DwellConfig {
            idle_timeout_ms: self.idle_timeout_ms,
            check_callbacks_interval_ms: self.check_callbacks_interval_ms,
        }
    }
}

/// Returns the platform-specific config directory for dwell.
///
/// On Linux: `~/.config/dwell`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dwell"))
}
