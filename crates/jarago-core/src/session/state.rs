//! The in-progress sleep session.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --begin--> Sleeping --drain--> Idle
//! ```
//!
//! `Session` is pure data plus guards; persistence, notifications and events
//! are the controller's business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::{validate_fatigue, InsomniaMessage, SleepRecord, DEFAULT_FATIGUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Sleeping,
}

/// Transient session fields, staged until the next completed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    bedtime: Option<DateTime<Utc>>,
    is_sleeping: bool,
    fatigue_level: u8,
    bedtime_message: String,
    insomnia_messages: Vec<InsomniaMessage>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            bedtime: None,
            is_sleeping: false,
            fatigue_level: DEFAULT_FATIGUE,
            bedtime_message: String::new(),
            insomnia_messages: Vec::new(),
        }
    }
}

impl Session {
    /// Rebuild a session from independently persisted fields.
    ///
    /// The sleeping flag follows the bedtime: a flag without a bedtime, or a
    /// bedtime without the flag, is treated as Idle. An out-of-range fatigue
    /// level falls back to the default.
    pub fn restore(
        bedtime: Option<DateTime<Utc>>,
        is_sleeping: bool,
        fatigue_level: u8,
        bedtime_message: String,
        insomnia_messages: Vec<InsomniaMessage>,
    ) -> Self {
        let bedtime = bedtime.filter(|_| is_sleeping);
        Self {
            is_sleeping: bedtime.is_some(),
            bedtime,
            fatigue_level: validate_fatigue(fatigue_level).unwrap_or(DEFAULT_FATIGUE),
            bedtime_message,
            insomnia_messages,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        if self.is_sleeping {
            SessionState::Sleeping
        } else {
            SessionState::Idle
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.is_sleeping
    }

    pub fn bedtime(&self) -> Option<DateTime<Utc>> {
        self.bedtime
    }

    pub fn fatigue_level(&self) -> u8 {
        self.fatigue_level
    }

    pub fn bedtime_message(&self) -> &str {
        &self.bedtime_message
    }

    pub fn insomnia_messages(&self) -> &[InsomniaMessage] {
        &self.insomnia_messages
    }

    pub fn has_system_message(&self) -> bool {
        self.insomnia_messages.iter().any(|m| !m.is_from_user)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Sleeping. Returns `false` if already sleeping.
    pub fn begin(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_sleeping {
            return false;
        }
        self.bedtime = Some(now);
        self.is_sleeping = true;
        true
    }

    /// Set the values the pre-sleep form collects.
    pub fn stage(
        &mut self,
        fatigue_level: u8,
        bedtime_message: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.fatigue_level = validate_fatigue(fatigue_level)?;
        self.bedtime_message = bedtime_message.into();
        Ok(())
    }

    /// Append a message. Returns `false` when idle.
    pub fn push(&mut self, message: InsomniaMessage) -> bool {
        if self.bedtime.is_none() {
            return false;
        }
        self.insomnia_messages.push(message);
        true
    }

    /// Sleeping -> Idle, turning the staged fields into a record.
    ///
    /// Returns `Ok(None)` when idle. The wake time never precedes the
    /// bedtime, even if the clock stepped backwards.
    pub fn drain(&mut self, now: DateTime<Utc>) -> Result<Option<SleepRecord>, ValidationError> {
        let Some(bedtime) = self.bedtime else {
            return Ok(None);
        };
        let record = SleepRecord::new(
            bedtime,
            now.max(bedtime),
            self.fatigue_level,
            std::mem::take(&mut self.bedtime_message),
            std::mem::take(&mut self.insomnia_messages),
        )?;
        self.reset();
        Ok(Some(record))
    }

    /// Back to a fresh Idle session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 5, 14, 0, 0).unwrap()
    }

    #[test]
    fn begin_only_from_idle() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.begin(t0()));
        assert_eq!(session.state(), SessionState::Sleeping);
        assert!(!session.begin(t0() + Duration::hours(1)));
        assert_eq!(session.bedtime(), Some(t0()));
    }

    #[test]
    fn push_ignored_when_idle() {
        let mut session = Session::default();
        assert!(!session.push(InsomniaMessage::from_user("hi", t0())));
        assert!(session.insomnia_messages().is_empty());
    }

    #[test]
    fn drain_builds_record_and_resets() {
        let mut session = Session::default();
        session.stage(4, "tired").unwrap();
        session.begin(t0());
        session.push(InsomniaMessage::from_user("awake", t0() + Duration::minutes(10)));

        let record = session.drain(t0() + Duration::hours(8)).unwrap().unwrap();
        assert_eq!(record.fatigue_level, 4);
        assert_eq!(record.bedtime_message, "tired");
        assert_eq!(record.insomnia_messages.len(), 1);
        assert_eq!(record.duration, 8.0 * 3600.0);
        assert_eq!(session, Session::default());
    }

    #[test]
    fn drain_when_idle_returns_none() {
        let mut session = Session::default();
        assert!(session.drain(t0()).unwrap().is_none());
    }

    #[test]
    fn drain_clamps_backwards_clock() {
        let mut session = Session::default();
        session.begin(t0());
        let record = session.drain(t0() - Duration::minutes(5)).unwrap().unwrap();
        assert_eq!(record.wake_time, record.bedtime);
        assert_eq!(record.duration, 0.0);
    }

    #[test]
    fn stage_rejects_bad_fatigue_without_change() {
        let mut session = Session::default();
        assert!(session.stage(7, "x").is_err());
        assert_eq!(session.fatigue_level(), DEFAULT_FATIGUE);
        assert_eq!(session.bedtime_message(), "");
    }

    #[test]
    fn restore_normalizes_inconsistent_fields() {
        let flag_only = Session::restore(None, true, 3, String::new(), Vec::new());
        assert_eq!(flag_only.state(), SessionState::Idle);

        let bedtime_only = Session::restore(Some(t0()), false, 3, String::new(), Vec::new());
        assert_eq!(bedtime_only.state(), SessionState::Idle);
        assert_eq!(bedtime_only.bedtime(), None);

        let bad_fatigue = Session::restore(Some(t0()), true, 0, String::new(), Vec::new());
        assert!(bad_fatigue.is_sleeping());
        assert_eq!(bad_fatigue.fatigue_level(), DEFAULT_FATIGUE);
    }
}
