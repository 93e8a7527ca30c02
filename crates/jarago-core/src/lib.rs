//! # Jarago Core Library
//!
//! Core logic of the Jarago sleep tracker. A user starts a sleep session at
//! bedtime, may log messages during a sleepless stretch, and ends the session
//! on waking; each completed session becomes a persisted [`SleepRecord`].
//! The CLI binary and any GUI shell are thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Session controller**: [`SleepController`], a single service object
//!   that owns the Idle/Sleeping state machine. It has no internal thread;
//!   the caller drives delayed signals with `tick()`.
//! - **Storage**: SQLite key-value persistence for records, the transient
//!   session and the sleep goal, plus TOML-based [`Config`].
//! - **Notifications**: one wake reminder per session through a pluggable
//!   [`Notifier`].
//! - **Events**: state changes and UI signals broadcast on an [`EventBus`].
//!
//! Time is read through a [`Clock`] so tests can pin it.

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod outcome;
pub mod record;
pub mod session;
pub mod stats;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{Event, EventBus, SignalHandle};
pub use notify::{MemoryNotifier, NotificationScheduler, Notifier, StoredNotifier, WakeNotification};
pub use outcome::Outcome;
pub use record::{InsomniaMessage, SleepRecord};
pub use session::{
    AutoWakeCheck, CompletionTrigger, MessageSubmission, Session, SessionState, SleepController,
};
pub use stats::{DailySleep, SleepStats};
pub use storage::{Config, Database};
