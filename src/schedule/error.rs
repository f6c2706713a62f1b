//! Error taxonomy for schedule mutations.
//!
//! Every failure of a [`GroupSchedule`](crate::schedule::GroupSchedule)
//! mutation is surfaced as a [`ScheduleError`] value. Nothing in this module
//! is ever raised past the schedule boundary as a panic; callers match on the
//! variant and translate it into a user-facing reply.

use thiserror::Error;

/// Failure modes of schedule mutations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A user-supplied value was out of range or otherwise unusable
    /// (bad weekday/hour/minute, impossible calendar date, a time that is
    /// not in the future, or date arithmetic that overflowed).
    #[error("invalid value: {0}")]
    Validation(String),

    /// The category already holds its configured maximum number of entries.
    /// No partial mutation took place.
    #[error("category is at its configured capacity of {0}")]
    CapacityExceeded(usize),

    /// An equal entry already exists. The schedule and its alert loops are
    /// left untouched.
    #[error("an equal entry already exists")]
    DuplicateEntry,

    /// The referenced entry or name does not exist.
    #[error("no matching entry")]
    NotFound,

    /// The bot cannot send messages in the requested channel.
    #[error("cannot send messages in that channel")]
    PermissionDenied,
}
