//! Completed sleep records and the messages logged during a session.

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const MIN_FATIGUE: u8 = 1;
pub const MAX_FATIGUE: u8 = 5;
pub const DEFAULT_FATIGUE: u8 = 3;

/// Reject fatigue levels outside `1..=5`.
pub fn validate_fatigue(level: u8) -> Result<u8, ValidationError> {
    if (MIN_FATIGUE..=MAX_FATIGUE).contains(&level) {
        Ok(level)
    } else {
        Err(ValidationError::FatigueOutOfRange(level))
    }
}

/// Midnight (local time) of the day containing `at`, as a UTC instant.
pub fn start_of_local_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_timezone(&Local)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(at)
}

/// A note logged while the user could not fall asleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsomniaMessage {
    pub id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// `false` for prompts posted by the app itself.
    pub is_from_user: bool,
}

impl InsomniaMessage {
    pub fn from_user(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            timestamp,
            is_from_user: true,
        }
    }

    pub fn from_system(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_from_user: false,
            ..Self::from_user(message, timestamp)
        }
    }
}

/// One completed night.
///
/// Everything except `sleep_review` is fixed at construction; `duration`
/// and `date` are derived from the two instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepRecord {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub bedtime: DateTime<Utc>,
    pub wake_time: DateTime<Utc>,
    /// Seconds between bedtime and wake time.
    pub duration: f64,
    pub fatigue_level: u8,
    pub bedtime_message: String,
    pub insomnia_messages: Vec<InsomniaMessage>,
    #[serde(default)]
    pub sleep_review: String,
}

impl SleepRecord {
    /// # Errors
    /// Returns an error if `wake_time` precedes `bedtime` or the fatigue
    /// level is out of range.
    pub fn new(
        bedtime: DateTime<Utc>,
        wake_time: DateTime<Utc>,
        fatigue_level: u8,
        bedtime_message: impl Into<String>,
        insomnia_messages: Vec<InsomniaMessage>,
    ) -> Result<Self, ValidationError> {
        if wake_time < bedtime {
            return Err(ValidationError::InvalidTimeRange {
                start: bedtime,
                end: wake_time,
            });
        }
        let fatigue_level = validate_fatigue(fatigue_level)?;
        let duration = (wake_time - bedtime).num_milliseconds() as f64 / 1000.0;
        Ok(Self {
            id: Uuid::new_v4(),
            date: start_of_local_day(bedtime),
            bedtime,
            wake_time,
            duration,
            fatigue_level,
            bedtime_message: bedtime_message.into(),
            insomnia_messages,
            sleep_review: String::new(),
        })
    }

    pub fn duration(&self) -> Duration {
        self.wake_time - self.bedtime
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration / 3600.0
    }

    /// `MM.dd`
    pub fn formatted_date(&self) -> String {
        self.date.with_timezone(&Local).format("%m.%d").to_string()
    }

    /// `HH:mm`
    pub fn formatted_bedtime(&self) -> String {
        self.bedtime.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// `HH:mm`
    pub fn formatted_wake_time(&self) -> String {
        self.wake_time.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// Whole hours and minutes, e.g. `7h 45m`.
    pub fn formatted_duration(&self) -> String {
        let hours = self.duration_hours().trunc();
        let minutes = ((self.duration_hours() - hours) * 60.0).trunc();
        format!("{}h {}m", hours as i64, minutes as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 5, h, m, 0).unwrap()
    }

    #[test]
    fn duration_is_derived_from_instants() {
        let bed = at(0, 30);
        let wake = at(8, 15);
        let record = SleepRecord::new(bed, wake, 3, "", Vec::new()).unwrap();
        assert_eq!(record.duration, 7.0 * 3600.0 + 45.0 * 60.0);
        assert_eq!(record.duration(), wake - bed);
        assert_eq!(record.formatted_duration(), "7h 45m");
        assert!(record.sleep_review.is_empty());
    }

    #[test]
    fn rejects_wake_before_bed() {
        let err = SleepRecord::new(at(8, 0), at(7, 0), 3, "", Vec::new()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimeRange { .. }));
    }

    #[test]
    fn rejects_fatigue_out_of_range() {
        assert!(SleepRecord::new(at(1, 0), at(2, 0), 0, "", Vec::new()).is_err());
        assert!(SleepRecord::new(at(1, 0), at(2, 0), 6, "", Vec::new()).is_err());
        assert!(SleepRecord::new(at(1, 0), at(2, 0), 5, "", Vec::new()).is_ok());
    }

    #[test]
    fn date_is_local_midnight_of_bedtime() {
        let bed = at(3, 0);
        let record = SleepRecord::new(bed, at(9, 0), 3, "", Vec::new()).unwrap();
        assert_eq!(record.date, start_of_local_day(bed));
        assert!(record.date <= record.bedtime);
        assert!(record.bedtime - record.date < Duration::days(1));
    }

    #[test]
    fn zero_length_session_is_allowed() {
        let record = SleepRecord::new(at(4, 0), at(4, 0), 3, "", Vec::new()).unwrap();
        assert_eq!(record.duration, 0.0);
        assert_eq!(record.formatted_duration(), "0h 0m");
    }

    #[test]
    fn system_messages_are_not_from_user() {
        let msg = InsomniaMessage::from_system("still awake?", at(1, 0));
        assert!(!msg.is_from_user);
        assert!(InsomniaMessage::from_user("yes", at(1, 1)).is_from_user);
    }

    #[test]
    fn serializes_camel_case_fields() {
        let record = SleepRecord::new(at(1, 0), at(2, 0), 2, "night", Vec::new()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("wakeTime").is_some());
        assert!(json.get("insomniaMessages").is_some());
        assert_eq!(json["fatigueLevel"], 2);
    }

    proptest! {
        #[test]
        fn duration_matches_interval(start in 0i64..2_000_000_000, len_ms in 0i64..86_400_000) {
            let bed = Utc.timestamp_opt(start, 0).unwrap();
            let wake = bed + Duration::milliseconds(len_ms);
            let record = SleepRecord::new(bed, wake, 3, "", Vec::new()).unwrap();
            prop_assert!(record.duration >= 0.0);
            prop_assert_eq!(record.duration, len_ms as f64 / 1000.0);
            prop_assert_eq!(record.duration(), wake - bed);
        }
    }
}
