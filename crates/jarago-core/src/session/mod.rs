mod auto_wake;
mod controller;
mod state;

pub use auto_wake::{
    duration_from_hours, validate_sleep_goal, AutoWakeDecision, AutoWakePolicy, MAX_SLEEP_GOAL_HOURS,
};
pub use controller::{AutoWakeCheck, CompletionTrigger, MessageSubmission, SleepController};
pub use state::{Session, SessionState};
