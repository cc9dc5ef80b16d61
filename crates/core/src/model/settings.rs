use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick period must be between 1 and 60000 ms")]
    InvalidTickPeriod,

    #[error("warning threshold must be <= 3600 seconds")]
    InvalidWarningThreshold,
}

/// Runtime knobs for a running exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    tick_period_ms: u32,
    warning_threshold_secs: u32,
}

/// Raw values collected from flags or environment before validation.
#[derive(Debug, Clone, Default)]
pub struct SessionSettingsDraft {
    pub tick_period_ms: Option<u32>,
    pub warning_threshold_secs: Option<u32>,
}

impl SessionSettingsDraft {
    /// Fill gaps with defaults and check ranges.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn validate(self) -> Result<SessionSettings, SettingsError> {
        let defaults = SessionSettings::default();
        SessionSettings::new(
            self.tick_period_ms.unwrap_or(defaults.tick_period_ms),
            self.warning_threshold_secs
                .unwrap_or(defaults.warning_threshold_secs),
        )
    }
}

impl SessionSettings {
    pub const DEFAULT_TICK_PERIOD_MS: u32 = 1_000;
    pub const DEFAULT_WARNING_THRESHOLD_SECS: u32 = 300;

    /// # Errors
    ///
    /// Returns `SettingsError` if the tick period is outside 1..=60000 ms or the
    /// warning threshold exceeds one hour.
    pub fn new(tick_period_ms: u32, warning_threshold_secs: u32) -> Result<Self, SettingsError> {
        if !(1..=60_000).contains(&tick_period_ms) {
            return Err(SettingsError::InvalidTickPeriod);
        }
        if warning_threshold_secs > 3_600 {
            return Err(SettingsError::InvalidWarningThreshold);
        }
        Ok(Self {
            tick_period_ms,
            warning_threshold_secs,
        })
    }

    /// Wall-clock time between two countdown ticks. Each tick still counts as one second.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_period_ms))
    }

    #[must_use]
    pub fn tick_period_ms(&self) -> u32 {
        self.tick_period_ms
    }

    /// Remaining seconds below which the countdown is shown as a warning.
    #[must_use]
    pub fn warning_threshold_secs(&self) -> u32 {
        self.warning_threshold_secs
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_period_ms: Self::DEFAULT_TICK_PERIOD_MS,
            warning_threshold_secs: Self::DEFAULT_WARNING_THRESHOLD_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_falls_back_to_defaults() {
        let settings = SessionSettingsDraft::default().validate().unwrap();
        assert_eq!(settings, SessionSettings::default());
        assert_eq!(settings.tick_period(), Duration::from_secs(1));
        assert_eq!(settings.warning_threshold_secs(), 300);
    }

    #[test]
    fn rejects_zero_tick_period() {
        let draft = SessionSettingsDraft {
            tick_period_ms: Some(0),
            warning_threshold_secs: None,
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidTickPeriod);
    }

    #[test]
    fn rejects_oversized_warning_threshold() {
        let err = SessionSettings::new(1_000, 4_000).unwrap_err();
        assert_eq!(err, SettingsError::InvalidWarningThreshold);
    }
}
