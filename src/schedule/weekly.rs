//! Recurring weekly meetings.
//!
//! A [`WeeklyMeeting`] is a time-of-week value (weekday, hour, minute); a
//! [`WeeklySlot`] pairs it with the absolute instant of its next occurrence.
//! The slot is the single stored entity per weekly meeting: the next
//! occurrence is recomputed in place when the meeting fires or is caught up
//! after downtime, so the display form and the firing time can never drift
//! apart.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};

use crate::schedule::{ScheduleError, TimePoint};

/// Weekday names indexed by the internal 0 = Monday .. 6 = Sunday numbering.
const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A recurring weekly time-of-day.
///
/// Ordering is by weekday, then hour, then minute; two meetings are
/// duplicates iff all three fields are equal. Weekdays are numbered
/// 0 = Monday through 6 = Sunday.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeeklyMeeting {
    weekday: u8,
    hour: u8,
    minute: u8,
}

impl WeeklyMeeting {
    /// Creates a weekly meeting, validating that `weekday` is in `0..=6`,
    /// `hour` in `0..=23` and `minute` in `0..=59`.
    pub fn new(weekday: u8, hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        if weekday > 6 {
            return Err(ScheduleError::Validation(format!(
                "weekday must be 0-6, got {weekday}"
            )));
        }
        if hour > 23 {
            return Err(ScheduleError::Validation(format!(
                "hour must be 0-23, got {hour}"
            )));
        }
        if minute > 59 {
            return Err(ScheduleError::Validation(format!(
                "minute must be 0-59, got {minute}"
            )));
        }

        Ok(WeeklyMeeting {
            weekday,
            hour,
            minute,
        })
    }

    /// Recovers the time-of-week form from an absolute instant by projecting
    /// its weekday, hour and minute. Used when loading persisted occurrence
    /// timestamps.
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        WeeklyMeeting {
            weekday: instant.weekday().num_days_from_monday() as u8,
            hour: instant.hour() as u8,
            minute: instant.minute() as u8,
        }
    }

    /// Compares this meeting against an absolute instant by projecting the
    /// instant's weekday, hour and minute.
    pub fn cmp_instant<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> Ordering {
        self.cmp(&WeeklyMeeting::from_instant(instant))
    }

    /// Computes the next occurrence of this meeting strictly after `now`.
    ///
    /// If the meeting's weekday is later in the week than `now`, this week's
    /// instance is returned; if it is earlier, next week's. On the matching
    /// weekday, a time-of-day that is still ahead yields today's instance,
    /// while a time-of-day that has already passed rolls to next week.
    /// A time-of-day exactly equal to `now`'s counts as passed.
    ///
    /// Returns `None` only when the date arithmetic overflows or the target
    /// wall-clock time does not exist in the local timezone.
    pub fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let today = now.weekday().num_days_from_monday() as u8;
        let days_ahead = if self.weekday > today {
            i64::from(self.weekday - today)
        } else if self.weekday < today {
            i64::from(7 - today + self.weekday)
        } else if (self.hour, self.minute) > (now.hour() as u8, now.minute() as u8) {
            0
        } else {
            7
        };

        let shifted = now.clone().checked_add_signed(Duration::days(days_ahead))?;
        shifted
            .with_hour(u32::from(self.hour))?
            .with_minute(u32::from(self.minute))?
            .with_second(0)?
            .with_nanosecond(0)
    }
}

impl fmt::Display for WeeklyMeeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s at {:02}:{:02}",
            WEEKDAY_NAMES[self.weekday as usize], self.hour, self.minute
        )
    }
}

/// A weekly meeting together with the absolute instant it next fires.
///
/// Slots are ordered by `next_occurrence` first, so a timeline of slots is in
/// firing order. Within one timeline every occurrence lies in the upcoming
/// week, so distinct meetings have distinct occurrences and the order is a
/// strict total order; the meeting fields act only as a formal tie-break.
/// Duplicate detection is done on the meeting fields alone, before insertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeeklySlot {
    pub meeting: WeeklyMeeting,
    pub next_occurrence: TimePoint,
}

impl WeeklySlot {
    /// Builds a slot for `meeting` with its next occurrence after `now`.
    pub fn upcoming(meeting: WeeklyMeeting, now: &TimePoint) -> Option<Self> {
        let next_occurrence = meeting.next_occurrence(now)?;
        Some(WeeklySlot {
            meeting,
            next_occurrence,
        })
    }

    /// Moves the occurrence one week forward after the meeting has fired.
    /// Returns `false` on date overflow, leaving the slot unchanged.
    pub fn advance_one_week(&mut self) -> bool {
        match self.next_occurrence.checked_add_signed(Duration::days(7)) {
            Some(next) => {
                self.next_occurrence = next;
                true
            }
            None => false,
        }
    }
}

impl Ord for WeeklySlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.next_occurrence
            .cmp(&other.next_occurrence)
            .then_with(|| self.meeting.cmp(&other.meeting))
    }
}

impl PartialOrd for WeeklySlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
