//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DwellError;

/// Default silence before the session auto-pauses.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 3_000;

/// Default poller cadence.
pub const DEFAULT_CHECK_CALLBACKS_INTERVAL_MS: u64 = 100;

/// Timing configuration for a [`DwellTracker`](crate::DwellTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    /// Silence duration before the session is considered idle.
    /// Default: 3000 (3 seconds).
    pub idle_timeout_ms: u64,

    /// Period of the poller tick. Also the resolution of idle detection.
    /// Default: 100.
    pub check_callbacks_interval_ms: u64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            check_callbacks_interval_ms: DEFAULT_CHECK_CALLBACKS_INTERVAL_MS,
        }
    }
}

impl DwellConfig {
    /// Rejects zero periods: a zero tick would spin and a zero timeout
    /// would idle on the first tick.
    pub const fn validate(&self) -> Result<(), DwellError> {
        if self.check_callbacks_interval_ms == 0 {
            return Err(DwellError::InvalidConfig {
                field: "check_callbacks_interval_ms",
                value: self.check_callbacks_interval_ms,
            });
        }
        if self.idle_timeout_ms == 0 {
            return Err(DwellError::InvalidConfig {
                field: "idle_timeout_ms",
                value: self.idle_timeout_ms,
            });
        }
        Ok(())
    }

    /// Tick period as a [`Duration`].
    pub const fn tick_period(&self) -> Duration {
        Duration::from_millis(self.check_callbacks_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DwellConfig::default();
        assert_eq!(config.idle_timeout_ms, 3000);
        assert_eq!(config.check_callbacks_interval_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_tick_period_rejected() {
        let config = DwellConfig {
            check_callbacks_interval_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            DwellError::InvalidConfig {
                field: "check_callbacks_interval_ms",
                value: 0
            }
        ));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let config = DwellConfig {
            idle_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DwellError::InvalidConfig {
                field: "idle_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DwellConfig =
            serde_json::from_str(r#"{"idle_timeout_ms": 5000}"#).unwrap();
        assert_eq!(config.idle_timeout_ms, 5000);
        assert_eq!(config.check_callbacks_interval_ms, 100);
    }

    #[test]
    fn test_tick_period() {
        let config = DwellConfig {
            check_callbacks_interval_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(250));
    }
}
