use std::time::{Duration, Instant};

use serde::Serialize;

use crate::sink::Severity;
use crate::types::TimingUnit;

/// Elapsed-time thresholds above which SQL timing lines escalate; `None` disables a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimingThresholds {
    pub warn_msec: Option<u64>,
    pub error_msec: Option<u64>,
}

impl TimingThresholds {
    #[must_use]
    pub fn new(warn_msec: Option<u64>, error_msec: Option<u64>) -> Self {
        Self {
            warn_msec,
            error_msec,
        }
    }

    /// Severity for an operation that took `elapsed`.
    ///
    /// Thresholds are inclusive. Below both, `accepts_debug` picks between the detailed
    /// `Debug` rendering and the plain `Info` one.
    #[must_use]
    pub fn classify(&self, elapsed: Duration, accepts_debug: bool) -> Severity {
        let msec = elapsed_msec(elapsed);
        if self.error_msec.is_some_and(|limit| msec >= limit) {
            Severity::Error
        } else if self.warn_msec.is_some_and(|limit| msec >= limit) {
            Severity::Warn
        } else if accepts_debug {
            Severity::Debug
        } else {
            Severity::Info
        }
    }
}

/// Run `operation`, returning its result untouched together with how long it took.
///
/// The elapsed time is measured on both the `Ok` and `Err` paths.
pub fn around<T, E, F>(operation: F) -> (Result<T, E>, Duration)
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let outcome = operation();
    (outcome, start.elapsed())
}

#[must_use]
pub fn elapsed_msec(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Elapsed time as the integer shown in log lines, in the configured unit.
#[must_use]
pub fn elapsed_in(elapsed: Duration, unit: TimingUnit) -> u128 {
    match unit {
        TimingUnit::Msec => elapsed.as_millis(),
        TimingUnit::Nanos => elapsed.as_nanos(),
    }
}
