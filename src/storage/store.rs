//! Per-group record files and the load-time catch-up logic.
//!
//! Each group owns one directory under the storage root, holding one plain
//! text file per category. Every file starts with the category's cursor on
//! its own line, followed by one entry per line. Persistence is fault
//! tolerant throughout: a failed write or a malformed line is logged and the
//! bot keeps running with what it has.
//!
//! Loading reconciles the records with the current time. Events that passed
//! while the bot was offline are not silently dropped: their duty rotations
//! are advanced as if the alerts had fired, recurring entries are moved to
//! their next future occurrence, and cursors are shrunk to match. If any
//! reconciliation happened, the corrected record is rewritten once at the end
//! of the load.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use log::{debug, error, warn};

use crate::schedule::{
    Birthday, GroupState, RotationList, TimePoint, WeeklyMeeting, WeeklySlot,
};

/// Timestamp format of all persisted instants, e.g. `2026-08-23 09:30:00 +0200`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";
/// Width in bytes of a formatted timestamp. Birthday lines are parsed by
/// splitting off a suffix of exactly this width.
pub const TIMESTAMP_WIDTH: usize = 25;

const MEETINGS_FILE: &str = "meetings.lst";
const WEEKLY_FILE: &str = "weekly_meetings.lst";
const BIRTHDAYS_FILE: &str = "bdays.lst";
const AGENDA_FILE: &str = "agenda_order.lst";
const MINUTES_FILE: &str = "minutes_order.lst";
const ALERT_CHANNEL_FILE: &str = "alert_channel.lst";

const MAX_DIR_NAME_CHARS: usize = 128;

/// Storage handle for one group's record files.
#[derive(Clone, Debug)]
pub struct GroupStore {
    dir: PathBuf,
}

impl GroupStore {
    /// Creates the handle for a group. Nothing is created on disk yet.
    ///
    /// # Arguments
    ///
    /// * `root` - Storage root directory
    /// * `group_id` - Stable identifier, first component of the directory name
    /// * `group_name` - Display name, sanitized into the second component
    ///
    /// # Returns
    ///
    /// A handle rooted at `{root}/{group_id}-{sanitized group_name}`.
    pub fn new(root: &Path, group_id: &str, group_name: &str) -> Self {
        let dir = root.join(format!("{group_id}-{}", sanitize_name(group_name)));
        GroupStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Removes the group's directory and everything in it. Called when the
    /// bot leaves the group.
    pub fn purge(&self) {
        if let Err(err) = fs::remove_dir_all(&self.dir) {
            if err.kind() != ErrorKind::NotFound {
                error!("could not remove group storage {}: {err}", self.dir.display());
            }
        }
    }

    /// Loads every record into `state`, reconciling entries against `now`.
    ///
    /// # Arguments
    ///
    /// * `state` - Fresh group state the records are loaded into
    /// * `now` - Reference instant for the catch-up rules; entries at or
    ///   before it count as passed
    pub fn load_into(&self, state: &mut GroupState, now: &TimePoint) {
        self.load_rotation(AGENDA_FILE, &mut state.agenda);
        self.load_rotation(MINUTES_FILE, &mut state.minutes);
        let rotations_before = (state.agenda.cursor(), state.minutes.cursor());

        self.load_meetings(state, now);
        self.load_weekly(state, now);
        self.load_birthdays(state, now);
        self.load_alert_channel(state);

        // Catch-up may have advanced the duty rotations.
        if (state.agenda.cursor(), state.minutes.cursor()) != rotations_before {
            self.save_agenda(&state.agenda);
            self.save_minutes(&state.minutes);
        }
    }

    pub fn save_meetings(&self, cursor: usize, meetings: &[TimePoint]) {
        self.write_record(
            MEETINGS_FILE,
            cursor,
            meetings.iter().map(format_timestamp),
        );
    }

    pub fn save_weekly(&self, cursor: usize, slots: &[WeeklySlot]) {
        self.write_record(
            WEEKLY_FILE,
            cursor,
            slots.iter().map(|slot| format_timestamp(&slot.next_occurrence)),
        );
    }

    pub fn save_birthdays(&self, cursor: usize, birthdays: &[Birthday]) {
        self.write_record(
            BIRTHDAYS_FILE,
            cursor,
            birthdays
                .iter()
                .map(|birthday| format!("{} {}", birthday.name(), format_timestamp(birthday.when()))),
        );
    }

    pub fn save_agenda(&self, rotation: &RotationList) {
        self.write_record(AGENDA_FILE, rotation.cursor(), rotation.names().iter().cloned());
    }

    pub fn save_minutes(&self, rotation: &RotationList) {
        self.write_record(MINUTES_FILE, rotation.cursor(), rotation.names().iter().cloned());
    }

    /// The alert channel record is a single line, or an empty file when no
    /// channel is available.
    pub fn save_alert_channel(&self, channel: Option<&str>) {
        let content = match channel {
            Some(channel) => format!("{channel}\n"),
            None => String::new(),
        };
        if let Err(err) = fs::write(self.dir.join(ALERT_CHANNEL_FILE), content) {
            error!("could not write {ALERT_CHANNEL_FILE}: {err}");
        }
    }

    fn load_meetings(&self, state: &mut GroupState, now: &TimePoint) {
        let Some((cursor, lines)) = self.read_record(MEETINGS_FILE) else {
            return;
        };
        let mut changed = false;
        let mut dropped = 0usize;
        for line in &lines {
            let Some(when) = parse_timestamp(line) else {
                warn!("{MEETINGS_FILE}: skipping malformed line {line:?}");
                changed = true;
                continue;
            };
            if when <= *now {
                // The meeting happened while the bot was offline, so the
                // minutes duty has rotated past it.
                debug!("meeting at {line} passed while offline");
                state.minutes.advance(1);
                dropped += 1;
                changed = true;
                continue;
            }
            if !state.meetings.insert(when) {
                warn!("{MEETINGS_FILE}: skipping duplicate entry {line:?}");
                changed = true;
            }
        }
        let adjusted = cursor.saturating_sub(dropped).min(state.meetings.len());
        if adjusted != cursor {
            changed = true;
        }
        state.meeting_index = adjusted;
        if changed {
            self.save_meetings(state.meeting_index, state.meetings.as_slice());
        }
    }

    fn load_weekly(&self, state: &mut GroupState, now: &TimePoint) {
        let Some((cursor, lines)) = self.read_record(WEEKLY_FILE) else {
            return;
        };
        let mut changed = false;
        let mut dropped = 0usize;
        for line in &lines {
            let Some(stored) = parse_timestamp(line) else {
                warn!("{WEEKLY_FILE}: skipping malformed line {line:?}");
                changed = true;
                continue;
            };
            let meeting = WeeklyMeeting::from_instant(&stored);
            if stored <= *now {
                // Every full week since the stored occurrence is a missed
                // meeting; an occurrence earlier today does not count.
                let missed = (now.signed_duration_since(stored).num_days() / 7) as usize;
                if missed > 0 {
                    debug!("{meeting} missed {missed} occurrence(s) while offline");
                    state.agenda.advance(missed);
                    state.minutes.advance(missed);
                }
                dropped += 1;
                changed = true;
                match WeeklySlot::upcoming(meeting, now) {
                    Some(corrected) => {
                        if !state.weekly.insert(corrected) {
                            warn!("{WEEKLY_FILE}: skipping duplicate entry {line:?}");
                        }
                    }
                    None => warn!("{WEEKLY_FILE}: could not reschedule {meeting}, dropping it"),
                }
                continue;
            }
            let slot = WeeklySlot {
                meeting,
                next_occurrence: stored,
            };
            if !state.weekly.insert(slot) {
                warn!("{WEEKLY_FILE}: skipping duplicate entry {line:?}");
                changed = true;
            }
        }
        let adjusted = cursor.saturating_sub(dropped).min(state.weekly.len());
        if adjusted != cursor {
            changed = true;
        }
        state.weekly_index = adjusted;
        if changed {
            self.save_weekly(state.weekly_index, state.weekly.as_slice());
        }
    }

    fn load_birthdays(&self, state: &mut GroupState, now: &TimePoint) {
        let Some((cursor, lines)) = self.read_record(BIRTHDAYS_FILE) else {
            return;
        };
        let mut changed = false;
        let mut dropped = 0usize;
        for line in &lines {
            let Some((name, when)) = parse_birthday_line(line) else {
                warn!("{BIRTHDAYS_FILE}: skipping malformed line {line:?}");
                changed = true;
                continue;
            };
            let mut birthday = Birthday::new(name, when);
            if *birthday.when() <= *now {
                if !birthday.catch_up(now) {
                    warn!("{BIRTHDAYS_FILE}: could not reschedule {line:?}, dropping it");
                    changed = true;
                    continue;
                }
                // The entry moved from the front of the timeline to the back.
                dropped += 1;
                changed = true;
            }
            if !state.birthdays.insert(birthday) {
                warn!("{BIRTHDAYS_FILE}: skipping duplicate entry {line:?}");
                changed = true;
            }
        }
        let adjusted = cursor.saturating_sub(dropped).min(state.birthdays.len());
        if adjusted != cursor {
            changed = true;
        }
        state.birthday_index = adjusted;
        if changed {
            self.save_birthdays(state.birthday_index, state.birthdays.as_slice());
        }
    }

    fn load_rotation(&self, file: &str, rotation: &mut RotationList) {
        let Some((cursor, names)) = self.read_record(file) else {
            return;
        };
        *rotation = RotationList::from_parts(names, cursor);
        if rotation.cursor() != cursor {
            warn!("{file}: cursor {cursor} out of range, clamped");
            self.write_record(file, rotation.cursor(), rotation.names().iter().cloned());
        }
    }

    fn load_alert_channel(&self, state: &mut GroupState) {
        match fs::read_to_string(self.dir.join(ALERT_CHANNEL_FILE)) {
            Ok(content) => {
                let line = content.lines().next().unwrap_or("").trim();
                if !line.is_empty() {
                    state.alert_channel = Some(line.to_string());
                }
            }
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!("could not read {ALERT_CHANNEL_FILE}: {err}");
                }
            }
        }
    }

    /// Reads a record file into its cursor and entry lines. Returns `None`
    /// when the file is missing, unreadable or empty; a malformed cursor
    /// falls back to 0.
    fn read_record(&self, file: &str) -> Option<(usize, Vec<String>)> {
        let content = match fs::read_to_string(self.dir.join(file)) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!("could not read {file}: {err}");
                }
                return None;
            }
        };
        let mut lines = content.lines();
        let cursor = match lines.next()?.trim().parse::<usize>() {
            Ok(cursor) => cursor,
            Err(_) => {
                warn!("{file}: malformed cursor line, falling back to 0");
                0
            }
        };
        let entries = lines
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Some((cursor, entries))
    }

    fn write_record(&self, file: &str, cursor: usize, lines: impl Iterator<Item = String>) {
        let mut content = format!("{cursor}\n");
        for line in lines {
            content.push_str(&line);
            content.push('\n');
        }
        if let Err(err) = fs::write(self.dir.join(file), content) {
            error!("could not write {file}: {err}");
        }
    }
}

pub(crate) fn format_timestamp(point: &TimePoint) -> String {
    point.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(text: &str) -> Option<TimePoint> {
    DateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|parsed| parsed.with_timezone(&chrono::Local))
}

/// Splits a `{name} {timestamp}` birthday line at the fixed-width timestamp
/// suffix. Names may contain spaces.
fn parse_birthday_line(line: &str) -> Option<(String, TimePoint)> {
    if line.len() <= TIMESTAMP_WIDTH {
        return None;
    }
    let split = line.len() - TIMESTAMP_WIDTH;
    if !line.is_char_boundary(split) {
        return None;
    }
    let name = line[..split].strip_suffix(' ')?;
    if name.is_empty() {
        return None;
    }
    let when = parse_timestamp(&line[split..])?;
    Some((name.to_string(), when))
}

/// Maps a group name onto a directory-safe form: anything that is not
/// alphanumeric, `-` or `_` becomes `_`, capped at 128 characters.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .take(MAX_DIR_NAME_CHARS)
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
