//! Result values for operations that may legitimately do nothing.
//!
//! The presentation layer swallows these (an ignored tap is not an error),
//! but tests and callers can still tell what happened.

use serde::{Deserialize, Serialize};

/// What an inbound call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T = ()> {
    /// The operation changed state.
    Applied(T),
    /// The operation is not valid in the current session state.
    IgnoredWrongState,
    /// The referenced record does not exist.
    NotFound,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// Consume the outcome, keeping the applied value if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::IgnoredWrongState => Outcome::IgnoredWrongState,
            Outcome::NotFound => Outcome::NotFound,
        }
    }
}
