//! Wake-up reminder scheduling.
//!
//! One local notification per session, fired at `bedtime + sleep goal`,
//! under a fixed identifier so that scheduling again replaces the previous
//! one. Delivery is the platform's job; a [`Notifier`] only has to accept
//! or refuse the request. Refusals are logged and otherwise ignored: a
//! missing reminder must never stop a session from starting.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::duration_from_hours;
use crate::storage::{Database, NotificationsConfig};

pub const WAKE_NOTIFICATION_ID: &str = "wakeUpNotification";
pub const PENDING_NOTIFICATION_KEY: &str = "pendingWakeNotification";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification permission denied")]
    PermissionDenied,

    #[error("notification backend failed: {0}")]
    Backend(String),
}

/// A calendar-triggered, non-repeating local notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeNotification {
    pub identifier: String,
    pub title: String,
    pub body: String,
    /// Trigger instant, at minute resolution.
    pub fire_at: DateTime<Utc>,
}

/// Platform side of local notifications.
pub trait Notifier {
    /// Schedule `notification`, replacing any pending one with the same
    /// identifier.
    fn schedule(&mut self, notification: WakeNotification) -> Result<(), NotifyError>;

    /// Remove the pending notification with `identifier`, if any.
    fn cancel(&mut self, identifier: &str) -> Result<(), NotifyError>;
}

pub struct NotificationScheduler {
    notifier: Box<dyn Notifier>,
    config: NotificationsConfig,
}

impl NotificationScheduler {
    pub fn new(notifier: Box<dyn Notifier>, config: NotificationsConfig) -> Self {
        Self { notifier, config }
    }

    /// `bedtime + goal_hours`, exact. `None` if the sum is out of range.
    pub fn wake_up_instant(bedtime: DateTime<Utc>, goal_hours: f64) -> Option<DateTime<Utc>> {
        bedtime.checked_add_signed(duration_from_hours(goal_hours)?)
    }

    /// Schedule the reminder for a session that began at `bedtime`.
    ///
    /// Returns the scheduled notification, or `None` when notifications are
    /// disabled, the wake instant is out of range, or the notifier refused.
    pub fn schedule_wake(
        &mut self,
        bedtime: DateTime<Utc>,
        goal_hours: f64,
    ) -> Option<WakeNotification> {
        if !self.config.enabled {
            tracing::debug!("wake notification disabled by configuration");
            return None;
        }
        let Some(wake_up_at) = Self::wake_up_instant(bedtime, goal_hours) else {
            tracing::warn!(goal_hours, "wake instant out of range, no notification scheduled");
            return None;
        };
        let fire_at = truncate_to_minute(wake_up_at);
        let notification = WakeNotification {
            identifier: WAKE_NOTIFICATION_ID.to_string(),
            title: self.config.title.clone(),
            body: self.config.body.clone(),
            fire_at,
        };
        match self.notifier.schedule(notification.clone()) {
            Ok(()) => {
                tracing::info!(%fire_at, "wake notification scheduled");
                Some(notification)
            }
            Err(e) => {
                tracing::warn!("wake notification scheduling failed: {e}");
                None
            }
        }
    }

    pub fn cancel_wake(&mut self) {
        if let Err(e) = self.notifier.cancel(WAKE_NOTIFICATION_ID) {
            tracing::warn!("wake notification cancel failed: {e}");
        }
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

#[derive(Debug, Default)]
struct MemoryNotifierState {
    pending: Option<WakeNotification>,
    scheduled_count: usize,
    refuse: bool,
}

/// In-process notifier. Clones share state, so a caller can keep one handle
/// to inspect what the controller scheduled.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    state: Rc<RefCell<MemoryNotifierState>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that refuses every request, as when permission is denied.
    pub fn refusing() -> Self {
        let notifier = Self::default();
        notifier.state.borrow_mut().refuse = true;
        notifier
    }

    pub fn pending(&self) -> Option<WakeNotification> {
        self.state.borrow().pending.clone()
    }

    /// Accepted schedule requests so far.
    pub fn scheduled_count(&self) -> usize {
        self.state.borrow().scheduled_count
    }
}

impl Notifier for MemoryNotifier {
    fn schedule(&mut self, notification: WakeNotification) -> Result<(), NotifyError> {
        let mut state = self.state.borrow_mut();
        if state.refuse {
            return Err(NotifyError::PermissionDenied);
        }
        state.pending = Some(notification);
        state.scheduled_count += 1;
        Ok(())
    }

    fn cancel(&mut self, identifier: &str) -> Result<(), NotifyError> {
        let mut state = self.state.borrow_mut();
        if state
            .pending
            .as_ref()
            .is_some_and(|n| n.identifier == identifier)
        {
            state.pending = None;
        }
        Ok(())
    }
}

/// Notifier that records the pending notification in the database, for
/// hosts that deliver it from another process.
pub struct StoredNotifier {
    db: Rc<Database>,
}

impl StoredNotifier {
    pub fn new(db: Rc<Database>) -> Self {
        Self { db }
    }

    /// The currently pending notification, if any.
    pub fn pending(db: &Database) -> crate::error::Result<Option<WakeNotification>> {
        let Some(json) = db.kv_get(PENDING_NOTIFICATION_KEY)? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&json).ok())
    }
}

impl Notifier for StoredNotifier {
    fn schedule(&mut self, notification: WakeNotification) -> Result<(), NotifyError> {
        let json = serde_json::to_string(&notification)
            .map_err(|e| NotifyError::Backend(e.to_string()))?;
        self.db
            .kv_set(PENDING_NOTIFICATION_KEY, &json)
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }

    fn cancel(&mut self, identifier: &str) -> Result<(), NotifyError> {
        let pending =
            Self::pending(&self.db).map_err(|e| NotifyError::Backend(e.to_string()))?;
        if pending.is_some_and(|n| n.identifier == identifier) {
            self.db
                .kv_delete(PENDING_NOTIFICATION_KEY)
                .map_err(|e| NotifyError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 5, 23, 4, 37).unwrap()
    }

    #[test]
    fn wake_up_instant_adds_goal() {
        assert_eq!(
            NotificationScheduler::wake_up_instant(bed(), 8.0),
            Some(bed() + Duration::hours(8))
        );
        assert_eq!(
            NotificationScheduler::wake_up_instant(bed(), 6.5),
            Some(bed() + Duration::minutes(390))
        );
    }

    #[test]
    fn unrepresentable_wake_instant_schedules_nothing() {
        assert_eq!(NotificationScheduler::wake_up_instant(bed(), 1e12), None);
        assert_eq!(NotificationScheduler::wake_up_instant(bed(), 1e300), None);

        let notifier = MemoryNotifier::new();
        let mut scheduler =
            NotificationScheduler::new(Box::new(notifier.clone()), NotificationsConfig::default());
        assert!(scheduler.schedule_wake(bed(), 1e12).is_none());
        assert_eq!(notifier.scheduled_count(), 0);
    }

    #[test]
    fn schedules_at_minute_resolution_under_fixed_id() {
        let notifier = MemoryNotifier::new();
        let mut scheduler =
            NotificationScheduler::new(Box::new(notifier.clone()), NotificationsConfig::default());

        let scheduled = scheduler.schedule_wake(bed(), 8.0).unwrap();
        assert_eq!(scheduled.identifier, WAKE_NOTIFICATION_ID);
        assert_eq!(
            scheduled.fire_at,
            Utc.with_ymd_and_hms(2025, 8, 6, 7, 4, 0).unwrap()
        );
        assert_eq!(notifier.pending(), Some(scheduled));
    }

    #[test]
    fn rescheduling_replaces_previous() {
        let notifier = MemoryNotifier::new();
        let mut scheduler =
            NotificationScheduler::new(Box::new(notifier.clone()), NotificationsConfig::default());
        scheduler.schedule_wake(bed(), 8.0);
        let second = scheduler.schedule_wake(bed() + Duration::days(1), 7.0).unwrap();
        assert_eq!(notifier.scheduled_count(), 2);
        assert_eq!(notifier.pending(), Some(second));
    }

    #[test]
    fn refusal_is_swallowed() {
        let notifier = MemoryNotifier::refusing();
        let mut scheduler =
            NotificationScheduler::new(Box::new(notifier.clone()), NotificationsConfig::default());
        assert!(scheduler.schedule_wake(bed(), 8.0).is_none());
        assert!(notifier.pending().is_none());
    }

    #[test]
    fn disabled_config_schedules_nothing() {
        let notifier = MemoryNotifier::new();
        let config = NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        };
        let mut scheduler = NotificationScheduler::new(Box::new(notifier.clone()), config);
        assert!(scheduler.schedule_wake(bed(), 8.0).is_none());
        assert_eq!(notifier.scheduled_count(), 0);
    }

    #[test]
    fn stored_notifier_persists_and_cancels() {
        let db = Rc::new(Database::open_memory().unwrap());
        let mut scheduler = NotificationScheduler::new(
            Box::new(StoredNotifier::new(Rc::clone(&db))),
            NotificationsConfig::default(),
        );
        let scheduled = scheduler.schedule_wake(bed(), 8.0).unwrap();
        assert_eq!(StoredNotifier::pending(&db).unwrap(), Some(scheduled));

        scheduler.cancel_wake();
        assert!(StoredNotifier::pending(&db).unwrap().is_none());
    }
}
