//! Error taxonomy for timer configuration and arming.

use thiserror::Error;

use crate::config::{MAX_PERIOD_MS, MIN_PERIOD_MS};

/// Errors surfaced by [`PrecisionTimer`](crate::PrecisionTimer) operations.
///
/// Configuration problems are rejected synchronously at the call that
/// introduced them; arm failures are local and non-fatal; the timer stays
/// idle and can be started again once the cause (typically slot exhaustion)
/// clears. Nothing in this crate escalates an error into a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TimerError {
    /// `start()` was called before any interval was configured.
    #[error("no interval configured; call configure() or set_interval() first")]
    Unconfigured,

    /// The requested period is outside the supported range.
    #[error("invalid period {0}ms (supported range: {MIN_PERIOD_MS}..={MAX_PERIOD_MS}ms)")]
    InvalidPeriod(u64),

    /// The requested resolution exceeds the configured period.
    #[error("resolution {resolution}ms exceeds period {period}ms")]
    InvalidResolution {
        /// Requested resolution hint in milliseconds.
        resolution: u64,
        /// Configured period in milliseconds.
        period: u64,
    },

    /// The platform driver refused to arm.
    ///
    /// The usual cause is exhaustion of the process-wide timer slot
    /// registry; a disposed driver also refuses. The timer is left idle.
    #[error("platform timer driver refused to arm")]
    ArmFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offending_value() {
        assert!(TimerError::InvalidPeriod(0).to_string().contains("0ms"));
        let err = TimerError::InvalidResolution {
            resolution: 20,
            period: 10,
        };
        assert!(err.to_string().contains("20ms"));
        assert!(err.to_string().contains("10ms"));
    }
}
