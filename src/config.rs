//! Configuration for the precision timer.
//!
//! `TimerConfig` carries everything a timer needs before arming: the tick
//! period, the resolution hint handed to the platform driver, the
//! periodic/one-shot mode, and whether `configure()` should arm immediately.
//! Validation is eager; a bad configuration is rejected at the call that
//! introduced it, never deferred to an opaque driver failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Smallest supported tick period in milliseconds.
pub const MIN_PERIOD_MS: u64 = 1;

/// Largest supported tick period in milliseconds.
///
/// Matches the cap of the multimedia-timer family of platform APIs this
/// crate's default driver stands in for.
pub const MAX_PERIOD_MS: u64 = 1_000_000;

/// Configuration options for [`PrecisionTimer`](crate::PrecisionTimer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Tick period in milliseconds.
    ///
    /// Required before arming; `0` means "not yet configured" and makes
    /// `start()` fail with [`TimerError::Unconfigured`]. Valid values are
    /// `MIN_PERIOD_MS..=MAX_PERIOD_MS`.
    pub period_ms: u64,

    /// Requested timing accuracy hint in milliseconds.
    ///
    /// `0` (the default) requests the finest resolution the driver can
    /// deliver, at the highest CPU cost: the default thread driver spends
    /// the longest busy-spin tail on each wait. Larger values relax the
    /// accuracy and shorten or eliminate the spin. Must not exceed the
    /// period.
    pub resolution_ms: u64,

    /// `true` (default) re-fires every period until stopped; `false` fires
    /// exactly once and then self-disarms.
    pub periodic: bool,

    /// Whether [`configure()`](crate::PrecisionTimer::configure) should arm
    /// the timer immediately. Default: `true`.
    pub auto_start: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period_ms: 0,
            resolution_ms: 0,
            periodic: true,
            auto_start: true,
        }
    }
}

impl TimerConfig {
    /// Create a periodic, auto-starting configuration with the given period.
    pub fn periodic(period_ms: u64) -> Self {
        Self {
            period_ms,
            ..Default::default()
        }
    }

    /// Create a one-shot, auto-starting configuration with the given delay.
    pub fn one_shot(period_ms: u64) -> Self {
        Self {
            period_ms,
            periodic: false,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the tick period in milliseconds.
    pub fn period_ms(mut self, ms: u64) -> Self {
        self.period_ms = ms;
        self
    }

    /// Set the tick period from a [`Duration`] (rounded down to whole
    /// milliseconds).
    pub fn period(mut self, period: Duration) -> Self {
        self.period_ms = period.as_millis() as u64;
        self
    }

    /// Set the resolution hint in milliseconds.
    pub fn resolution_ms(mut self, ms: u64) -> Self {
        self.resolution_ms = ms;
        self
    }

    /// Set periodic (`true`) or one-shot (`false`) mode.
    pub fn set_periodic(mut self, periodic: bool) -> Self {
        self.periodic = periodic;
        self
    }

    /// Set whether `configure()` arms the timer immediately.
    pub fn set_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check that this configuration can be armed.
    ///
    /// Returns [`TimerError::Unconfigured`] when no period was ever set,
    /// [`TimerError::InvalidPeriod`] for an out-of-range period, and
    /// [`TimerError::InvalidResolution`] when the resolution hint exceeds
    /// the period.
    pub fn validate(&self) -> Result<(), TimerError> {
        if self.period_ms == 0 {
            return Err(TimerError::Unconfigured);
        }
        if !(MIN_PERIOD_MS..=MAX_PERIOD_MS).contains(&self.period_ms) {
            return Err(TimerError::InvalidPeriod(self.period_ms));
        }
        if self.resolution_ms > self.period_ms {
            return Err(TimerError::InvalidResolution {
                resolution: self.resolution_ms,
                period: self.period_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TimerConfig::default();
        assert_eq!(config.period_ms, 0);
        assert_eq!(config.resolution_ms, 0);
        assert!(config.periodic);
        assert!(config.auto_start);
    }

    #[test]
    fn preset_constructors() {
        let periodic = TimerConfig::periodic(50);
        assert_eq!(periodic.period_ms, 50);
        assert!(periodic.periodic);

        let one_shot = TimerConfig::one_shot(100);
        assert_eq!(one_shot.period_ms, 100);
        assert!(!one_shot.periodic);
    }

    #[test]
    fn builder_methods() {
        let config = TimerConfig::default()
            .period(Duration::from_millis(25))
            .resolution_ms(2)
            .set_periodic(false)
            .set_auto_start(false);

        assert_eq!(config.period_ms, 25);
        assert_eq!(config.resolution_ms, 2);
        assert!(!config.periodic);
        assert!(!config.auto_start);
    }

    #[test]
    fn validation_rejects_unset_period() {
        assert_eq!(
            TimerConfig::default().validate(),
            Err(TimerError::Unconfigured)
        );
    }

    #[test]
    fn validation_rejects_out_of_range_period() {
        let config = TimerConfig::periodic(MAX_PERIOD_MS + 1);
        assert_eq!(
            config.validate(),
            Err(TimerError::InvalidPeriod(MAX_PERIOD_MS + 1))
        );
    }

    #[test]
    fn validation_rejects_resolution_above_period() {
        let config = TimerConfig::periodic(10).resolution_ms(20);
        assert_eq!(
            config.validate(),
            Err(TimerError::InvalidResolution {
                resolution: 20,
                period: 10
            })
        );
    }

    #[test]
    fn validation_accepts_boundaries() {
        assert!(TimerConfig::periodic(MIN_PERIOD_MS).validate().is_ok());
        assert!(TimerConfig::periodic(MAX_PERIOD_MS).validate().is_ok());
        assert!(TimerConfig::periodic(10).resolution_ms(10).validate().is_ok());
    }
}
