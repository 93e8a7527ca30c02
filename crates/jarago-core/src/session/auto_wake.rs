//! Foreground check that closes an overdue session.

use chrono::{DateTime, Duration, Utc};

use crate::error::ValidationError;
use crate::storage::SessionConfig;

/// Longest sleep goal accepted, in hours.
pub const MAX_SLEEP_GOAL_HOURS: f64 = 24.0;

/// Reject goals that are not a positive number of hours up to a day.
pub fn validate_sleep_goal(hours: f64) -> Result<f64, ValidationError> {
    if hours.is_finite() && hours > 0.0 && hours <= MAX_SLEEP_GOAL_HOURS {
        Ok(hours)
    } else {
        Err(ValidationError::InvalidValue {
            field: "sleep_goal".into(),
            message: format!(
                "must be more than 0 and at most {MAX_SLEEP_GOAL_HOURS} hours, got {hours}"
            ),
        })
    }
}

/// Convert fractional hours to a millisecond-precision duration.
///
/// Returns `None` when the value is not finite or does not fit a `Duration`.
pub fn duration_from_hours(hours: f64) -> Option<Duration> {
    let millis = (hours * 3_600_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoWakeDecision {
    Wake,
    Wait { elapsed: Duration, threshold: Duration },
}

/// A session is overdue once `max(minimum, goal)` has elapsed since bedtime.
///
/// The floor keeps a quick background/foreground bounce right after bedtime
/// from ending the night.
#[derive(Debug, Clone, Copy)]
pub struct AutoWakePolicy {
    minimum: Duration,
}

impl Default for AutoWakePolicy {
    fn default() -> Self {
        Self {
            minimum: Duration::hours(1),
        }
    }
}

impl AutoWakePolicy {
    pub fn new(minimum: Duration) -> Self {
        Self { minimum }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::minutes(i64::from(config.auto_wake_minimum_minutes)))
    }

    /// An unrepresentable goal never elapses.
    pub fn threshold(&self, goal_hours: f64) -> Duration {
        self.minimum
            .max(duration_from_hours(goal_hours).unwrap_or(Duration::MAX))
    }

    pub fn evaluate(
        &self,
        bedtime: DateTime<Utc>,
        now: DateTime<Utc>,
        goal_hours: f64,
    ) -> AutoWakeDecision {
        let elapsed = now - bedtime;
        let threshold = self.threshold(goal_hours);
        if elapsed >= threshold {
            AutoWakeDecision::Wake
        } else {
            AutoWakeDecision::Wait { elapsed, threshold }
        }
    }
}
