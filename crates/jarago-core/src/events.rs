//! State-change events and UI signals.
//!
//! Every state change in the controller produces an [`Event`] on the bus.
//! Presentation collaborators subscribe once and render what they receive.
//! Some signals are delayed (the review prompt after a session ends, the
//! dismissal of the active-session view after a reset); those wait in the
//! bus until the owner calls [`EventBus::tick`] with a time past their due
//! instant. There is no internal thread.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::record::{InsomniaMessage, SleepRecord};
use crate::session::CompletionTrigger;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SleepStarted {
        bedtime: DateTime<Utc>,
        /// `None` when the goal puts it out of range.
        wake_up_at: Option<DateTime<Utc>>,
    },
    SessionStaged {
        fatigue_level: u8,
        bedtime_message: String,
    },
    InsomniaMessageAdded {
        message: InsomniaMessage,
    },
    SessionCompleted {
        record_id: Uuid,
        trigger: CompletionTrigger,
        duration_secs: f64,
        at: DateTime<Utc>,
    },
    SleepReviewUpdated {
        record_id: Uuid,
        at: DateTime<Utc>,
    },
    RecordDeleted {
        record_id: Uuid,
        at: DateTime<Utc>,
    },
    AllRecordsDeleted {
        count: usize,
        at: DateTime<Utc>,
    },
    SleepGoalUpdated {
        hours: f64,
        at: DateTime<Utc>,
    },

    // UI signals
    ResetToPrimaryView,
    ShowReviewPrompt,
    NavigateToRecordDetail {
        record: SleepRecord,
    },
    DismissActiveSessionView,
}

impl Event {
    /// Whether this is a navigation signal rather than a state change.
    pub fn is_signal(&self) -> bool {
        matches!(
            self,
            Event::ResetToPrimaryView
                | Event::ShowReviewPrompt
                | Event::NavigateToRecordDetail { .. }
                | Event::DismissActiveSessionView
        )
    }
}

/// Cancellation handle for a delayed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandle(u64);

#[derive(Debug)]
struct Pending {
    handle: SignalHandle,
    due_at: DateTime<Utc>,
    event: Event,
}

/// Broadcast bus with a queue of delayed events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    pending: Vec<Pending>,
    next_handle: u64,
    closed: bool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            pending: Vec::new(),
            next_handle: 0,
            closed: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Deliver now. Dropped silently once the bus is shut down.
    pub fn publish(&self, event: Event) {
        if self.closed {
            return;
        }
        tracing::debug!(?event, signal = event.is_signal(), "publishing event");
        // No subscribers is fine: nobody is rendering.
        let _ = self.sender.send(event);
    }

    /// Queue `event` for delivery at `now + delay`.
    ///
    /// Returns `None` once the bus is shut down.
    pub fn publish_after(
        &mut self,
        event: Event,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Option<SignalHandle> {
        if self.closed {
            return None;
        }
        let handle = SignalHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Pending {
            handle,
            due_at: now + delay,
            event,
        });
        Some(handle)
    }

    /// Drop a queued event. Returns `false` if it was already delivered or
    /// cancelled.
    pub fn cancel(&mut self, handle: SignalHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    /// Deliver every queued event due at or before `now`, earliest first.
    /// Returns how many were delivered.
    pub fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.due_at <= now);
        self.pending = waiting;
        self.deliver(due)
    }

    /// Deliver every queued event regardless of its due time.
    ///
    /// For short-lived callers (a CLI invocation) that will not be around
    /// when the delays expire.
    pub fn flush(&mut self) -> usize {
        let due = std::mem::take(&mut self.pending);
        self.deliver(due)
    }

    fn deliver(&self, mut due: Vec<Pending>) -> usize {
        due.sort_by(|a, b| a.due_at.cmp(&b.due_at).then(a.handle.0.cmp(&b.handle.0)));
        let count = due.len();
        for p in due {
            self.publish(p.event);
        }
        count
    }

    /// Events still waiting, in queue order.
    pub fn pending(&self) -> impl Iterator<Item = (&Event, DateTime<Utc>)> {
        self.pending.iter().map(|p| (&p.event, p.due_at))
    }

    /// Cancel everything queued and refuse further events.
    /// Returns how many queued events were dropped.
    pub fn shutdown(&mut self) -> usize {
        self.closed = true;
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-08-06T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn publish_reaches_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::ResetToPrimaryView);
        assert_eq!(rx.try_recv().unwrap(), Event::ResetToPrimaryView);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn delayed_events_wait_for_tick() {
        let mut bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish_after(Event::DismissActiveSessionView, Duration::seconds(1), now());
        bus.publish_after(Event::ShowReviewPrompt, Duration::milliseconds(500), now());

        assert_eq!(bus.tick(now()), 0);
        assert!(rx.try_recv().is_err());

        assert_eq!(bus.tick(now() + Duration::milliseconds(500)), 1);
        assert_eq!(rx.try_recv().unwrap(), Event::ShowReviewPrompt);

        assert_eq!(bus.tick(now() + Duration::seconds(2)), 1);
        assert_eq!(rx.try_recv().unwrap(), Event::DismissActiveSessionView);
        assert_eq!(bus.pending().count(), 0);
    }

    #[test]
    fn cancelled_event_is_never_delivered() {
        let mut bus = EventBus::new();
        let mut rx = bus.subscribe();
        let handle = bus
            .publish_after(Event::ShowReviewPrompt, Duration::seconds(1), now())
            .unwrap();
        assert!(bus.cancel(handle));
        assert!(!bus.cancel(handle));
        assert_eq!(bus.tick(now() + Duration::hours(1)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn flush_delivers_in_due_order() {
        let mut bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish_after(Event::DismissActiveSessionView, Duration::seconds(1), now());
        bus.publish_after(Event::ShowReviewPrompt, Duration::milliseconds(500), now());
        assert_eq!(bus.flush(), 2);
        assert_eq!(rx.try_recv().unwrap(), Event::ShowReviewPrompt);
        assert_eq!(rx.try_recv().unwrap(), Event::DismissActiveSessionView);
    }

    #[test]
    fn shutdown_drops_queue_and_blocks_new_events() {
        let mut bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish_after(Event::ShowReviewPrompt, Duration::seconds(1), now());
        assert_eq!(bus.shutdown(), 1);
        assert!(bus.is_closed());
        assert!(bus
            .publish_after(Event::ShowReviewPrompt, Duration::zero(), now())
            .is_none());
        bus.publish(Event::ResetToPrimaryView);
        assert_eq!(bus.tick(now() + Duration::hours(1)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn signals_are_distinguished_from_state_changes() {
        assert!(Event::ShowReviewPrompt.is_signal());
        assert!(!Event::SleepGoalUpdated { hours: 8.0, at: now() }.is_signal());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(Event::DismissActiveSessionView).unwrap();
        assert_eq!(json["type"], "dismiss_active_session_view");
    }
}
