//! Birthday entries.
//!
//! A birthday is stored as a full timestamp (its next occurrence at the
//! configured alert hour) so it sorts into a timeline like any other event.
//! Identity is the calendar day plus the name: two entries on the same day
//! for different people are both kept, while the same day and the same name
//! is a duplicate regardless of the stored year.

use std::cmp::Ordering;

use chrono::{Datelike, NaiveDate, TimeZone, Timelike};

use crate::schedule::{ScheduleError, TimePoint};

/// A birthday with the absolute instant of its next alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Birthday {
    name: String,
    when: TimePoint,
}

impl Birthday {
    pub fn new(name: impl Into<String>, when: TimePoint) -> Self {
        Birthday {
            name: name.into(),
            when,
        }
    }

    /// Builds the entry for a month/day with the next occurrence at the
    /// configured alert time: this year if the alert instant is still ahead,
    /// otherwise next year.
    ///
    /// The calendar day is validated (Feb 29 is accepted and falls back to
    /// Feb 28 in non-leap years); an impossible day such as Apr 31 is a
    /// [`ScheduleError::Validation`].
    pub fn upcoming(
        month: u32,
        day: u32,
        name: &str,
        now: &TimePoint,
        alert_hour: u32,
        alert_minute: u32,
    ) -> Result<Self, ScheduleError> {
        // Validate the day against a leap year so Feb 29 passes.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(ScheduleError::Validation(format!(
                "no such calendar day: month {month}, day {day}"
            )));
        }

        let overflow =
            || ScheduleError::Validation("birthday date arithmetic overflowed".to_string());
        let this_year =
            local_at(now.year(), month, day, alert_hour, alert_minute).ok_or_else(overflow)?;
        let when = if this_year < *now {
            local_at(now.year() + 1, month, day, alert_hour, alert_minute).ok_or_else(overflow)?
        } else {
            this_year
        };

        Ok(Birthday::new(name, when))
    }

    /// Duplicate identity: same month, same day, same name. The year is
    /// ignored.
    pub fn same_person_day(&self, other: &Birthday) -> bool {
        self.matches(other.when.month(), other.when.day(), &other.name)
    }

    pub fn matches(&self, month: u32, day: u32, name: &str) -> bool {
        self.when.month() == month && self.when.day() == day && self.name == name
    }

    /// Moves the alert instant one year forward after it has fired.
    /// Returns `false` on date overflow, leaving the entry unchanged.
    pub fn roll_year_forward(&mut self) -> bool {
        match with_year_fallback(&self.when, self.when.year() + 1) {
            Some(next) => {
                self.when = next;
                true
            }
            None => false,
        }
    }

    /// Re-anchors a loaded entry whose alert instant lies in the past: the
    /// year is rolled to `now`'s, then one further if the birthday has
    /// already passed this year. Returns `false` on date overflow.
    pub fn catch_up(&mut self, now: &TimePoint) -> bool {
        if self.when >= *now {
            return true;
        }
        let Some(this_year) = with_year_fallback(&self.when, now.year()) else {
            return false;
        };
        self.when = this_year;
        if self.when < *now {
            return self.roll_year_forward();
        }
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn when(&self) -> &TimePoint {
        &self.when
    }
}

impl Ord for Birthday {
    fn cmp(&self, other: &Self) -> Ordering {
        self.when
            .cmp(&other.when)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Birthday {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Builds a local timestamp, mapping Feb 29 to Feb 28 in non-leap years.
fn local_at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<TimePoint> {
    match chrono::Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
    {
        Some(instant) => Some(instant),
        None if month == 2 && day == 29 => chrono::Local
            .with_ymd_and_hms(year, 2, 28, hour, minute, 0)
            .earliest(),
        None => None,
    }
}

/// `with_year` with the same Feb 29 fallback.
fn with_year_fallback(when: &TimePoint, year: i32) -> Option<TimePoint> {
    if let Some(shifted) = when.with_year(year) {
        return Some(shifted);
    }
    if when.month() == 2 && when.day() == 29 {
        return local_at(year, 2, 29, when.hour(), when.minute());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local};

    fn now() -> TimePoint {
        Local.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn test_upcoming_future_day_stays_this_year() {
        let birthday = Birthday::upcoming(12, 1, "Josh", &now(), 8, 0).unwrap();

        assert_eq!(birthday.when().year(), 2026);
        assert_eq!(birthday.when().month(), 12);
        assert_eq!(birthday.when().day(), 1);
        assert_eq!(birthday.when().hour(), 8);
    }

    #[test]
    fn test_upcoming_past_day_rolls_to_next_year() {
        let birthday = Birthday::upcoming(3, 3, "Sam", &now(), 8, 0).unwrap();

        assert_eq!(birthday.when().year(), 2027);
    }

    #[test]
    fn test_upcoming_rejects_impossible_day() {
        assert!(matches!(
            Birthday::upcoming(4, 31, "Nobody", &now(), 8, 0),
            Err(ScheduleError::Validation(_))
        ));
        assert!(matches!(
            Birthday::upcoming(13, 1, "Nobody", &now(), 8, 0),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn test_upcoming_accepts_leap_day() {
        let birthday = Birthday::upcoming(2, 29, "Leap", &now(), 8, 0).unwrap();

        // 2027 is not a leap year, so the alert falls back to Feb 28.
        assert_eq!(birthday.when().year(), 2027);
        assert_eq!(birthday.when().month(), 2);
        assert_eq!(birthday.when().day(), 28);
    }

    #[test]
    fn test_same_person_day_ignores_year() {
        let a = Birthday::upcoming(3, 3, "Sam", &now(), 8, 0).unwrap();
        let mut b = a.clone();
        assert!(b.roll_year_forward());

        assert!(a.same_person_day(&b));
    }

    #[test]
    fn test_same_day_different_name_is_not_duplicate() {
        let sam = Birthday::upcoming(3, 3, "Sam", &now(), 8, 0).unwrap();
        let alex = Birthday::upcoming(3, 3, "Alex", &now(), 8, 0).unwrap();

        assert!(!sam.same_person_day(&alex));
        assert_ne!(sam.cmp(&alex), Ordering::Equal);
    }

    #[test]
    fn test_catch_up_rolls_past_entry_forward() {
        let reference = now();
        let stale = Birthday::new(
            "Chandler",
            Local.with_ymd_and_hms(2024, 1, 7, 8, 0, 0).single().unwrap(),
        );
        let mut entry = stale.clone();

        assert!(entry.catch_up(&reference));
        // Jan 7 2026 already passed relative to Aug 2026, so one more year.
        assert_eq!(entry.when().year(), 2027);
        assert!(*entry.when() > reference);
        assert!(entry.same_person_day(&stale));
    }

    #[test]
    fn test_catch_up_leaves_future_entry_alone() {
        let reference = now();
        let mut entry = Birthday::new("Holly", reference + Duration::days(10));
        let before = entry.when().clone();

        assert!(entry.catch_up(&reference));
        assert_eq!(*entry.when(), before);
    }
}
