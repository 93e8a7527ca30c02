//! The sleep session controller.
//!
//! One explicitly constructed service object owns the record store, the
//! transient session, the wake notification scheduler and the event bus.
//! Presentation code calls its commands, reads its published state through
//! the query methods and listens on [`SleepController::subscribe`].
//!
//! Commands run synchronously and write through to storage before they
//! return. A command that does not apply in the current state returns
//! [`Outcome::IgnoredWrongState`]; a lookup miss returns
//! [`Outcome::NotFound`]. Neither is an error.

use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::auto_wake::{validate_sleep_goal, AutoWakeDecision, AutoWakePolicy};
use super::state::Session;
use crate::clock::Clock;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::notify::{NotificationScheduler, Notifier};
use crate::outcome::Outcome;
use crate::record::{InsomniaMessage, SleepRecord};
use crate::stats::{self, SleepStats};
use crate::storage::{Config, Database, RecordStore, SessionStore, MAX_SIGNAL_DELAY_MS};

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// The user said they are awake.
    WakeUp,
    /// The user aborted from the active-session screen.
    Cancel,
    /// The user aborted from the insomnia chat.
    Reset,
    /// The goal elapsed while the app was in the background.
    AutoWake,
}

/// Result of the foreground check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AutoWakeCheck {
    NotSleeping,
    TooEarly {
        elapsed_secs: i64,
        threshold_secs: i64,
    },
    Completed {
        record: SleepRecord,
    },
}

/// Result of a chat submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MessageSubmission {
    /// Blank text, nothing happened.
    Empty,
    Added { outcome: Outcome<InsomniaMessage> },
    /// The text asked to cancel; the session was reset.
    Cancelled { outcome: Outcome<SleepRecord> },
}

pub struct SleepController {
    records: RecordStore,
    session: Session,
    session_store: SessionStore,
    scheduler: NotificationScheduler,
    bus: EventBus,
    clock: Box<dyn Clock>,
    auto_wake: AutoWakePolicy,
    config: Config,
    sleep_goal: f64,
}

impl SleepController {
    /// Load persisted records, session and goal from `db`.
    ///
    /// # Errors
    /// Returns an error only if the database cannot be read. Undecodable
    /// values are treated as absent.
    pub fn new(
        db: Rc<Database>,
        notifier: Box<dyn Notifier>,
        clock: Box<dyn Clock>,
        config: Config,
    ) -> Result<Self> {
        let records = RecordStore::load(Rc::clone(&db))?;
        let session_store = SessionStore::new(db);
        let session = session_store.load_session()?;
        let sleep_goal = session_store.load_sleep_goal(config.session.default_sleep_goal_hours)?;
        tracing::debug!(
            records = records.len(),
            sleeping = session.is_sleeping(),
            sleep_goal,
            "sleep controller loaded"
        );
        Ok(Self {
            records,
            session,
            session_store,
            scheduler: NotificationScheduler::new(notifier, config.notifications.clone()),
            bus: EventBus::new(),
            clock,
            auto_wake: AutoWakePolicy::from_config(&config.session),
            config,
            sleep_goal,
        })
    }

    // ── Published state ──────────────────────────────────────────────

    /// All records in store order.
    pub fn records(&self) -> &[SleepRecord] {
        self.records.records()
    }

    pub fn record(&self, id: Uuid) -> Option<&SleepRecord> {
        self.records.get(id)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_sleeping(&self) -> bool {
        self.session.is_sleeping()
    }

    pub fn current_sleep_goal(&self) -> f64 {
        self.sleep_goal
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// When the current session reaches its goal.
    pub fn wake_up_instant(&self) -> Option<DateTime<Utc>> {
        self.session
            .bedtime()
            .and_then(|bed| NotificationScheduler::wake_up_instant(bed, self.sleep_goal))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn recent_records(&self) -> Vec<SleepRecord> {
        stats::recent(self.records.records(), self.config.records.recent_limit)
    }

    pub fn average_sleep_duration_hours(&self) -> f64 {
        stats::average_duration_hours(self.records.records())
    }

    pub fn records_in_last_n_days(&self, days: u32) -> Vec<SleepRecord> {
        stats::in_last_n_days(self.records.records(), days, self.clock.now())
    }

    pub fn stats(&self) -> SleepStats {
        stats::summarize(self.records.records(), self.sleep_goal, self.clock.now())
    }

    // ── Session commands ─────────────────────────────────────────────

    /// Idle -> Sleeping. Returns the bedtime.
    pub fn start_sleep(&mut self) -> Result<Outcome<DateTime<Utc>>> {
        let now = self.clock.now();
        let mut next = self.session.clone();
        if !next.begin(now) {
            tracing::debug!("start_sleep ignored: already sleeping");
            return Ok(Outcome::IgnoredWrongState);
        }
        self.session_store.save_session(&next)?;
        self.session = next;

        self.scheduler.schedule_wake(now, self.sleep_goal);
        let wake_up_at = NotificationScheduler::wake_up_instant(now, self.sleep_goal);
        tracing::info!(bedtime = %now, ?wake_up_at, "sleep started");
        self.bus.publish(Event::SleepStarted {
            bedtime: now,
            wake_up_at,
        });
        Ok(Outcome::Applied(now))
    }

    /// Set the fatigue level and bedtime note carried into the next record.
    ///
    /// # Errors
    /// Returns a validation error if `fatigue_level` is outside 1..=5.
    pub fn stage_session(&mut self, fatigue_level: u8, bedtime_message: &str) -> Result<()> {
        let mut next = self.session.clone();
        next.stage(fatigue_level, bedtime_message)?;
        self.session_store.save_session(&next)?;
        self.session = next;
        self.bus.publish(Event::SessionStaged {
            fatigue_level,
            bedtime_message: bedtime_message.to_string(),
        });
        Ok(())
    }

    pub fn add_insomnia_message(&mut self, text: &str) -> Result<Outcome<InsomniaMessage>> {
        let message = InsomniaMessage::from_user(text, self.clock.now());
        self.push_message(message)
    }

    /// Post a message authored by the app rather than the user.
    pub fn add_system_prompt(&mut self, text: &str) -> Result<Outcome<InsomniaMessage>> {
        let message = InsomniaMessage::from_system(text, self.clock.now());
        self.push_message(message)
    }

    /// Entering the chat posts the welcome prompt once per session.
    ///
    /// Returns the posted prompt, or `None` if one was already posted.
    pub fn open_insomnia_chat(&mut self) -> Result<Outcome<Option<InsomniaMessage>>> {
        if !self.session.is_sleeping() {
            return Ok(Outcome::IgnoredWrongState);
        }
        if self.session.has_system_message() {
            return Ok(Outcome::Applied(None));
        }
        let welcome = self.config.session.welcome_prompt.clone();
        Ok(self.add_system_prompt(&welcome)?.map(Some))
    }

    /// Chat entry point: blank text is dropped, a cancel keyword resets the
    /// session, anything else is logged as an insomnia message.
    pub fn submit_message(&mut self, text: &str) -> Result<MessageSubmission> {
        if text.trim().is_empty() {
            return Ok(MessageSubmission::Empty);
        }
        if self.config.is_cancel_message(text) {
            tracing::info!("cancel keyword received");
            let outcome = self.reset_to_initial_state()?;
            return Ok(MessageSubmission::Cancelled { outcome });
        }
        let outcome = self.add_insomnia_message(text)?;
        Ok(MessageSubmission::Added { outcome })
    }

    fn push_message(&mut self, message: InsomniaMessage) -> Result<Outcome<InsomniaMessage>> {
        let mut next = self.session.clone();
        if !next.push(message.clone()) {
            tracing::debug!("message ignored: not sleeping");
            return Ok(Outcome::IgnoredWrongState);
        }
        self.session_store.save_session(&next)?;
        self.session = next;
        self.bus.publish(Event::InsomniaMessageAdded {
            message: message.clone(),
        });
        Ok(Outcome::Applied(message))
    }

    /// "I'm awake."
    pub fn wake_up(&mut self) -> Result<Outcome<SleepRecord>> {
        self.complete_session(CompletionTrigger::WakeUp)
    }

    pub fn cancel_sleep(&mut self) -> Result<Outcome<SleepRecord>> {
        self.complete_session(CompletionTrigger::Cancel)
    }

    /// Abort from the chat; also dismisses the active-session view.
    pub fn reset_to_initial_state(&mut self) -> Result<Outcome<SleepRecord>> {
        let outcome = self.complete_session(CompletionTrigger::Reset)?;
        if outcome.is_applied() {
            let delay = signal_delay(self.config.signals.dismiss_delay_ms);
            self.bus
                .publish_after(Event::DismissActiveSessionView, delay, self.clock.now());
        }
        Ok(outcome)
    }

    /// Lifecycle hook, called on every transition to the foreground.
    pub fn on_foreground(&mut self) -> Result<AutoWakeCheck> {
        let Some(bedtime) = self.session.bedtime() else {
            return Ok(AutoWakeCheck::NotSleeping);
        };
        match self
            .auto_wake
            .evaluate(bedtime, self.clock.now(), self.sleep_goal)
        {
            AutoWakeDecision::Wait { elapsed, threshold } => Ok(AutoWakeCheck::TooEarly {
                elapsed_secs: elapsed.num_seconds(),
                threshold_secs: threshold.num_seconds(),
            }),
            AutoWakeDecision::Wake => {
                tracing::info!("goal elapsed while backgrounded, completing session");
                match self.complete_session(CompletionTrigger::AutoWake)? {
                    Outcome::Applied(record) => Ok(AutoWakeCheck::Completed { record }),
                    _ => Ok(AutoWakeCheck::NotSleeping),
                }
            }
        }
    }

    fn complete_session(&mut self, trigger: CompletionTrigger) -> Result<Outcome<SleepRecord>> {
        let now = self.clock.now();
        let mut next = self.session.clone();
        let Some(record) = next.drain(now)? else {
            tracing::debug!(?trigger, "completion ignored: not sleeping");
            return Ok(Outcome::IgnoredWrongState);
        };

        let session_entries = SessionStore::session_entries(&next)?;
        self.records.append_with(record.clone(), session_entries)?;
        self.session = next;
        self.scheduler.cancel_wake();

        tracing::info!(
            ?trigger,
            record_id = %record.id,
            duration = %record.formatted_duration(),
            "sleep session completed"
        );
        self.bus.publish(Event::SessionCompleted {
            record_id: record.id,
            trigger,
            duration_secs: record.duration,
            at: now,
        });
        self.bus.publish(Event::ResetToPrimaryView);
        let delay = signal_delay(self.config.signals.review_prompt_delay_ms);
        self.bus.publish_after(Event::ShowReviewPrompt, delay, now);
        Ok(Outcome::Applied(record))
    }

    // ── Record commands ──────────────────────────────────────────────

    /// Overwrite the review of a record.
    pub fn add_sleep_review(&mut self, record_id: Uuid, text: &str) -> Result<Outcome> {
        let outcome = self.records.set_review(record_id, text)?;
        if outcome.is_applied() {
            self.bus.publish(Event::SleepReviewUpdated {
                record_id,
                at: self.clock.now(),
            });
        }
        Ok(outcome)
    }

    pub fn delete_record(&mut self, record_id: Uuid) -> Result<Outcome> {
        let outcome = self.records.delete(record_id)?.map(|_| ());
        if outcome.is_applied() {
            tracing::info!(%record_id, "record deleted");
            self.bus.publish(Event::RecordDeleted {
                record_id,
                at: self.clock.now(),
            });
        }
        Ok(outcome)
    }

    /// Wipe every record, end any session, and restore the default goal.
    ///
    /// Returns how many records were removed.
    pub fn delete_all_records(&mut self) -> Result<usize> {
        let idle = Session::default();
        let default_goal = self.config.session.default_sleep_goal_hours;
        let mut entries = SessionStore::session_entries(&idle)?;
        entries.push(SessionStore::sleep_goal_entry(default_goal)?);
        let count = self.records.clear_with(entries)?;

        self.session = idle;
        self.sleep_goal = default_goal;
        self.scheduler.cancel_wake();

        let now = self.clock.now();
        tracing::info!(count, "all records deleted, settings reset");
        self.bus.publish(Event::AllRecordsDeleted { count, at: now });
        self.bus.publish(Event::SleepGoalUpdated {
            hours: default_goal,
            at: now,
        });
        Ok(count)
    }

    /// Ask the presentation layer to show one record.
    pub fn open_record(&self, record_id: Uuid) -> Outcome {
        match self.records.get(record_id) {
            Some(record) => {
                self.bus.publish(Event::NavigateToRecordDetail {
                    record: record.clone(),
                });
                Outcome::Applied(())
            }
            None => Outcome::NotFound,
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// # Errors
    /// Returns a validation error unless `hours` is finite, positive and at
    /// most a day.
    pub fn update_sleep_goal(&mut self, hours: f64) -> Result<()> {
        let hours = validate_sleep_goal(hours)?;
        self.session_store.save_sleep_goal(hours)?;
        self.sleep_goal = hours;
        tracing::info!(hours, "sleep goal updated");
        self.bus.publish(Event::SleepGoalUpdated {
            hours,
            at: self.clock.now(),
        });
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Deliver delayed signals that are now due. Call from the event loop.
    pub fn tick(&mut self) -> usize {
        self.bus.tick(self.clock.now())
    }

    /// Deliver every delayed signal immediately.
    pub fn flush_events(&mut self) -> usize {
        self.bus.flush()
    }

    /// Delayed signals still waiting, with their due instants.
    pub fn pending_events(&self) -> Vec<(Event, DateTime<Utc>)> {
        self.bus
            .pending()
            .map(|(event, due)| (event.clone(), due))
            .collect()
    }

    /// Cancel queued signals and stop publishing.
    pub fn shutdown(&mut self) {
        if self.bus.is_closed() {
            return;
        }
        let dropped = self.bus.shutdown();
        if dropped > 0 {
            tracing::debug!(dropped, "cancelled pending signals on shutdown");
        }
    }
}

fn signal_delay(millis: u64) -> Duration {
    Duration::milliseconds(millis.min(MAX_SIGNAL_DELAY_MS) as i64)
}

impl Drop for SleepController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
