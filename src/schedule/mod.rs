//! Group schedules: event timelines, duty rotations and their coordination.

pub mod birthday;
pub mod error;
pub mod group;
pub mod registry;
pub mod rotation;
pub mod timeline;
pub mod weekly;

pub use birthday::Birthday;
pub use error::ScheduleError;
pub use group::{Category, GroupSchedule, GroupState};
pub use registry::ScheduleRegistry;
pub use rotation::RotationList;
pub use timeline::SortedTimeline;
pub use weekly::{WeeklyMeeting, WeeklySlot};

/// An absolute, timezone-aware instant as stored in timelines.
pub type TimePoint = chrono::DateTime<chrono::Local>;
