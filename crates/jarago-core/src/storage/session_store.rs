//! Persistence of the transient session and the sleep goal.
//!
//! Each session field lives under its own key so an in-progress session
//! survives a process restart. A key that is missing or does not decode
//! falls back to its default on its own; the other keys are unaffected.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::Database;
use crate::error::Result;
use crate::record::{InsomniaMessage, DEFAULT_FATIGUE};
use crate::session::{validate_sleep_goal, Session};

pub const SLEEP_GOAL_KEY: &str = "sleepGoal";
pub const BEDTIME_KEY: &str = "currentBedtime";
pub const IS_SLEEPING_KEY: &str = "isSleeping";
pub const FATIGUE_KEY: &str = "currentFatigueLevel";
pub const BEDTIME_MESSAGE_KEY: &str = "currentBedtimeMessage";
pub const INSOMNIA_MESSAGES_KEY: &str = "currentInsomniaMessages";

pub struct SessionStore {
    db: Rc<Database>,
}

impl SessionStore {
    pub fn new(db: Rc<Database>) -> Self {
        Self { db }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(json) = self.db.kv_get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, "ignoring undecodable value: {e}");
                Ok(None)
            }
        }
    }

    pub fn load_session(&self) -> Result<Session> {
        let bedtime: Option<DateTime<Utc>> = self.read::<Option<DateTime<Utc>>>(BEDTIME_KEY)?.flatten();
        let is_sleeping: bool = self.read(IS_SLEEPING_KEY)?.unwrap_or(false);
        let fatigue: u8 = self.read(FATIGUE_KEY)?.unwrap_or(DEFAULT_FATIGUE);
        let message: String = self.read(BEDTIME_MESSAGE_KEY)?.unwrap_or_default();
        let messages: Vec<InsomniaMessage> = self.read(INSOMNIA_MESSAGES_KEY)?.unwrap_or_default();
        Ok(Session::restore(bedtime, is_sleeping, fatigue, message, messages))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        self.db.kv_set_many(&Self::session_entries(session)?)
    }

    /// The key/value pairs `save_session` writes, for callers that need
    /// them in a larger transaction.
    pub fn session_entries(session: &Session) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (BEDTIME_KEY, serde_json::to_string(&session.bedtime())?),
            (IS_SLEEPING_KEY, serde_json::to_string(&session.is_sleeping())?),
            (FATIGUE_KEY, serde_json::to_string(&session.fatigue_level())?),
            (BEDTIME_MESSAGE_KEY, serde_json::to_string(session.bedtime_message())?),
            (INSOMNIA_MESSAGES_KEY, serde_json::to_string(session.insomnia_messages())?),
        ])
    }

    /// The stored goal, or `default` when absent, undecodable or out of range.
    pub fn load_sleep_goal(&self, default: f64) -> Result<f64> {
        let goal = self
            .read::<f64>(SLEEP_GOAL_KEY)?
            .and_then(|g| validate_sleep_goal(g).ok())
            .unwrap_or(default);
        Ok(goal)
    }

    pub fn save_sleep_goal(&self, hours: f64) -> Result<()> {
        let (key, value) = Self::sleep_goal_entry(hours)?;
        self.db.kv_set(key, &value)
    }

    pub fn sleep_goal_entry(hours: f64) -> Result<(&'static str, String)> {
        Ok((SLEEP_GOAL_KEY, serde_json::to_string(&hours)?))
    }
}
