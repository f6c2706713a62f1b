//! Per-group schedule state and its coordinating facade.
//!
//! [`GroupState`] is the pure data: one sorted timeline per event category,
//! each paired with a cursor marking the boundary between "already warned"
//! and "not yet warned" entries, plus the two duty rotations and the alert
//! channel. [`GroupSchedule`] wraps the state in the shared handles the alert
//! loops run against and enforces the mutation rules: validation, capacity,
//! duplicate rejection, persistence and loop coordination.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Local, Timelike};
use log::{error, info};
use tokio::sync::Mutex;

use crate::alerts::{deliver, persist_category, AlertLoops, LoopCtx};
use crate::announce::{first_sendable, ChannelDirectory, Notifier};
use crate::config::{Config, Limits};
use crate::schedule::{
    Birthday, RotationList, ScheduleError, SortedTimeline, TimePoint, WeeklyMeeting, WeeklySlot,
};
use crate::storage::GroupStore;

/// The three event categories, each with its own timeline and alert loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Meetings,
    Weekly,
    Birthdays,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Meetings, Category::Weekly, Category::Birthdays];

    pub fn label(self) -> &'static str {
        match self {
            Category::Meetings => "meetings",
            Category::Weekly => "weekly meetings",
            Category::Birthdays => "birthdays",
        }
    }
}

/// All scheduled data of one group.
#[derive(Debug, Default)]
pub struct GroupState {
    pub(crate) meetings: SortedTimeline<TimePoint>,
    pub(crate) meeting_index: usize,
    pub(crate) weekly: SortedTimeline<WeeklySlot>,
    pub(crate) weekly_index: usize,
    pub(crate) birthdays: SortedTimeline<Birthday>,
    pub(crate) birthday_index: usize,
    pub(crate) agenda: RotationList,
    pub(crate) minutes: RotationList,
    pub(crate) alert_channel: Option<String>,
}

impl GroupState {
    pub(crate) fn len(&self, category: Category) -> usize {
        match category {
            Category::Meetings => self.meetings.len(),
            Category::Weekly => self.weekly.len(),
            Category::Birthdays => self.birthdays.len(),
        }
    }

    pub(crate) fn cursor(&self, category: Category) -> usize {
        match category {
            Category::Meetings => self.meeting_index,
            Category::Weekly => self.weekly_index,
            Category::Birthdays => self.birthday_index,
        }
    }

    pub(crate) fn set_cursor(&mut self, category: Category, value: usize) {
        match category {
            Category::Meetings => self.meeting_index = value,
            Category::Weekly => self.weekly_index = value,
            Category::Birthdays => self.birthday_index = value,
        }
    }

    /// The absolute instant of the entry at `index`, if any.
    pub(crate) fn occurrence_at(&self, category: Category, index: usize) -> Option<TimePoint> {
        match category {
            Category::Meetings => self.meetings.get(index).copied(),
            Category::Weekly => self.weekly.get(index).map(|slot| slot.next_occurrence),
            Category::Birthdays => self.birthdays.get(index).map(|birthday| *birthday.when()),
        }
    }

    /// The "soon" warning for the entry at `index`, including whose turn it
    /// is on duty for meeting categories.
    pub(crate) fn soon_message(
        &self,
        category: Category,
        index: usize,
        lead: Duration,
    ) -> Option<String> {
        let minutes = lead.num_minutes();
        match category {
            Category::Meetings => {
                let when = self.meetings.get(index)?;
                Some(format!(
                    "Reminder: the meeting on {} starts in {} minutes.{}",
                    when.format("%A at %H:%M"),
                    minutes,
                    duty_line("minutes", &self.minutes),
                ))
            }
            Category::Weekly => {
                let slot = self.weekly.get(index)?;
                Some(format!(
                    "Reminder: the weekly meeting ({}) starts in {} minutes.{}{}",
                    slot.meeting,
                    minutes,
                    duty_line("agenda", &self.agenda),
                    duty_line("minutes", &self.minutes),
                ))
            }
            Category::Birthdays => {
                let birthday = self.birthdays.get(index)?;
                Some(format!(
                    "Heads up: it's {}'s birthday today.",
                    birthday.name()
                ))
            }
        }
    }

    /// The "now" announcement for the earliest entry, if any.
    pub(crate) fn now_message(&self, category: Category) -> Option<String> {
        match category {
            Category::Meetings => {
                let when = self.meetings.first()?;
                Some(format!(
                    "The meeting scheduled for {} is starting now!{}",
                    when.format("%A at %H:%M"),
                    duty_line("minutes", &self.minutes),
                ))
            }
            Category::Weekly => {
                let slot = self.weekly.first()?;
                Some(format!(
                    "The weekly meeting ({}) is starting now!{}{}",
                    slot.meeting,
                    duty_line("agenda", &self.agenda),
                    duty_line("minutes", &self.minutes),
                ))
            }
            Category::Birthdays => {
                let birthday = self.birthdays.first()?;
                Some(format!("Happy birthday, {}!", birthday.name()))
            }
        }
    }

    /// Retires or reschedules the earliest entry after its "now" alert and
    /// advances the duty rotations it drives. The cursor shrinks by one to
    /// match.
    pub(crate) fn fire_front(&mut self, category: Category) {
        match category {
            Category::Meetings => {
                self.meetings.pop_front();
                self.minutes.advance(1);
                self.meeting_index = self.meeting_index.saturating_sub(1);
            }
            Category::Weekly => {
                if let Some(mut slot) = self.weekly.pop_front() {
                    if slot.advance_one_week() {
                        self.weekly.insert(slot);
                    }
                }
                self.agenda.advance(1);
                self.minutes.advance(1);
                self.weekly_index = self.weekly_index.saturating_sub(1);
            }
            Category::Birthdays => {
                if let Some(mut birthday) = self.birthdays.pop_front() {
                    if birthday.roll_year_forward() {
                        self.birthdays.insert(birthday);
                    }
                }
                self.birthday_index = self.birthday_index.saturating_sub(1);
            }
        }
    }
}

fn duty_line(role: &str, rotation: &RotationList) -> String {
    match rotation.current() {
        Some(name) => format!("\n{name} takes care of the {role}."),
        None => String::new(),
    }
}

/// Where an insertion landed relative to the category cursor, and what loop
/// work it entails.
enum InsertEffect {
    /// Beyond the cursor: the loops are already waiting on earlier entries.
    Beyond,
    /// Exactly at the cursor: the soon loop is sleeping toward a later entry.
    AtCursor,
    /// Before the cursor: the entry is more urgent than anything pending, so
    /// its "soon" warning fires synchronously.
    BeforeCursor { front: bool, message: Option<String> },
}

/// The schedule facade for one group.
///
/// Constructed when the bot joins the group or at startup for each known
/// group; the persisted records are loaded and reconciled at construction.
/// All mutation methods return their failures as [`ScheduleError`] values.
pub struct GroupSchedule {
    ctx: LoopCtx,
    limits: Limits,
    birthday_hour: u32,
    birthday_minute: u32,
}

impl GroupSchedule {
    /// Creates the schedule for one group, loading and reconciling whatever
    /// was persisted for it.
    ///
    /// The stored alert channel is validated against `directory`; if it no
    /// longer exists or no longer grants send permission, the first sendable
    /// channel is used instead and the corrected choice is persisted.
    ///
    /// # Arguments
    ///
    /// * `root` - Storage root directory holding one subdirectory per group
    /// * `group_id` - Stable identifier of the group
    /// * `group_name` - Display name, sanitized into the directory name
    /// * `notifier` - Outbound message sink for alert announcements
    /// * `directory` - The group's channels and send permissions
    /// * `config` - Limits, lead time and birthday alert time
    ///
    /// # Returns
    ///
    /// A schedule with its state loaded and caught up. The alert loops are
    /// not running yet; call [`start_alert_loops`](Self::start_alert_loops).
    pub fn new(
        root: &Path,
        group_id: &str,
        group_name: &str,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn ChannelDirectory>,
        config: &Config,
    ) -> Self {
        let store = GroupStore::new(root, group_id, group_name);
        if let Err(err) = store.ensure_dir() {
            error!(
                "could not create storage directory {}: {err}",
                store.dir().display()
            );
        }

        let mut state = GroupState::default();
        store.load_into(&mut state, &Local::now());

        // The stored channel may no longer exist or no longer be sendable.
        let stored = state.alert_channel.take();
        let resolved = stored
            .clone()
            .filter(|channel| {
                directory.channels().iter().any(|known| known == channel)
                    && directory.can_send(channel)
            })
            .or_else(|| first_sendable(directory.as_ref()));
        if resolved != stored {
            info!("alert channel for group {group_id} resolved to {resolved:?}");
            store.save_alert_channel(resolved.as_deref());
        }
        state.alert_channel = resolved;

        let ctx = LoopCtx {
            state: Arc::new(Mutex::new(state)),
            loops: Arc::new(Mutex::new(AlertLoops::default())),
            store,
            notifier,
            directory,
            lead: Duration::minutes(config.alerts.lead_minutes),
        };
        GroupSchedule {
            ctx,
            limits: config.limits.clone(),
            birthday_hour: config.alerts.birthday_hour,
            birthday_minute: config.alerts.birthday_minute,
        }
    }

    pub async fn start_alert_loops(&self) {
        self.ctx.loops.lock().await.start_all(self.ctx.clone());
    }

    pub async fn stop_alert_loops(&self) {
        self.ctx.loops.lock().await.stop_all();
    }

    /// Deletes the group's record files. The schedule must not be used
    /// afterwards.
    pub fn purge_storage(&self) {
        self.ctx.store.purge();
    }

    /// Schedules a one-time meeting. The time must be strictly in the future
    /// and is truncated to whole seconds to match the persisted precision.
    pub async fn add_meeting(&self, time: TimePoint) -> Result<(), ScheduleError> {
        let time = time.with_nanosecond(0).ok_or_else(|| {
            ScheduleError::Validation("unrepresentable meeting time".to_string())
        })?;
        if time <= Local::now() {
            return Err(ScheduleError::Validation(
                "meeting time must be in the future".to_string(),
            ));
        }
        let position = {
            let mut state = self.ctx.state.lock().await;
            if state.meetings.len() >= self.limits.max_meetings {
                return Err(ScheduleError::CapacityExceeded(self.limits.max_meetings));
            }
            state
                .meetings
                .insert_ranked(time)
                .ok_or(ScheduleError::DuplicateEntry)?
        };
        info!("meeting scheduled for {time}");
        self.coordinate_insert(Category::Meetings, position).await;
        Ok(())
    }

    /// Schedules a weekly recurring meeting. Two weekly meetings are
    /// duplicates iff weekday, hour and minute are all equal.
    pub async fn add_weekly_meeting(&self, meeting: WeeklyMeeting) -> Result<(), ScheduleError> {
        let now = Local::now();
        let position = {
            let mut state = self.ctx.state.lock().await;
            if state.weekly.len() >= self.limits.max_weekly_meetings {
                return Err(ScheduleError::CapacityExceeded(
                    self.limits.max_weekly_meetings,
                ));
            }
            if state.weekly.iter().any(|slot| slot.meeting == meeting) {
                return Err(ScheduleError::DuplicateEntry);
            }
            let slot = WeeklySlot::upcoming(meeting, &now).ok_or_else(|| {
                ScheduleError::Validation("could not compute the next occurrence".to_string())
            })?;
            state
                .weekly
                .insert_ranked(slot)
                .ok_or(ScheduleError::DuplicateEntry)?
        };
        info!("weekly meeting scheduled: {meeting}");
        self.coordinate_insert(Category::Weekly, position).await;
        Ok(())
    }

    /// Registers a birthday. Identity is (month, day, name): the same day
    /// with a different name is a distinct entry.
    pub async fn add_birthday(
        &self,
        month: u32,
        day: u32,
        name: &str,
    ) -> Result<(), ScheduleError> {
        let now = Local::now();
        let position = {
            let mut state = self.ctx.state.lock().await;
            if state.birthdays.len() >= self.limits.max_birthdays {
                return Err(ScheduleError::CapacityExceeded(self.limits.max_birthdays));
            }
            if state
                .birthdays
                .iter()
                .any(|birthday| birthday.matches(month, day, name))
            {
                return Err(ScheduleError::DuplicateEntry);
            }
            let birthday = Birthday::upcoming(
                month,
                day,
                name,
                &now,
                self.birthday_hour,
                self.birthday_minute,
            )?;
            state
                .birthdays
                .insert_ranked(birthday)
                .ok_or(ScheduleError::DuplicateEntry)?
        };
        info!("birthday registered for {name} on {month:02}-{day:02}");
        self.coordinate_insert(Category::Birthdays, position).await;
        Ok(())
    }

    /// Removes the meetings at the given 1-based positions, all or nothing.
    pub async fn remove_meetings(&self, positions: &[usize]) -> Result<(), ScheduleError> {
        self.remove_positions(Category::Meetings, positions).await
    }

    pub async fn remove_weekly_meetings(&self, positions: &[usize]) -> Result<(), ScheduleError> {
        self.remove_positions(Category::Weekly, positions).await
    }

    /// Removes a birthday by its (month, day, name) identity.
    pub async fn remove_birthday(
        &self,
        month: u32,
        day: u32,
        name: &str,
    ) -> Result<(), ScheduleError> {
        let position = {
            let state = self.ctx.state.lock().await;
            state
                .birthdays
                .iter()
                .position(|birthday| birthday.matches(month, day, name))
                .ok_or(ScheduleError::NotFound)?
        };
        self.remove_positions(Category::Birthdays, &[position + 1])
            .await
    }

    /// Replaces the agenda duty list wholesale and resets its cursor.
    /// A list of `max_rotation` names or more is rejected.
    pub async fn set_agenda_order(&self, names: Vec<String>) -> Result<(), ScheduleError> {
        if names.len() >= self.limits.max_rotation {
            return Err(ScheduleError::CapacityExceeded(self.limits.max_rotation));
        }
        let mut state = self.ctx.state.lock().await;
        if !state.agenda.set(names) {
            return Err(ScheduleError::DuplicateEntry);
        }
        self.ctx.store.save_agenda(&state.agenda);
        Ok(())
    }

    pub async fn set_minutes_order(&self, names: Vec<String>) -> Result<(), ScheduleError> {
        if names.len() >= self.limits.max_rotation {
            return Err(ScheduleError::CapacityExceeded(self.limits.max_rotation));
        }
        let mut state = self.ctx.state.lock().await;
        if !state.minutes.set(names) {
            return Err(ScheduleError::DuplicateEntry);
        }
        self.ctx.store.save_minutes(&state.minutes);
        Ok(())
    }

    pub async fn clear_agenda_order(&self) {
        let mut state = self.ctx.state.lock().await;
        state.agenda.clear();
        self.ctx.store.save_agenda(&state.agenda);
    }

    pub async fn clear_minutes_order(&self) {
        let mut state = self.ctx.state.lock().await;
        state.minutes.clear();
        self.ctx.store.save_minutes(&state.minutes);
    }

    /// Moves the agenda cursor to the first name equal to `name`.
    pub async fn set_agenda_to(&self, name: &str) -> Result<(), ScheduleError> {
        let mut state = self.ctx.state.lock().await;
        if !state.agenda.set_to(name) {
            return Err(ScheduleError::NotFound);
        }
        self.ctx.store.save_agenda(&state.agenda);
        Ok(())
    }

    pub async fn set_minutes_to(&self, name: &str) -> Result<(), ScheduleError> {
        let mut state = self.ctx.state.lock().await;
        if !state.minutes.set_to(name) {
            return Err(ScheduleError::NotFound);
        }
        self.ctx.store.save_minutes(&state.minutes);
        Ok(())
    }

    pub async fn advance_agenda(&self, amount: usize) {
        let mut state = self.ctx.state.lock().await;
        state.agenda.advance(amount);
        self.ctx.store.save_agenda(&state.agenda);
    }

    pub async fn advance_minutes(&self, amount: usize) {
        let mut state = self.ctx.state.lock().await;
        state.minutes.advance(amount);
        self.ctx.store.save_minutes(&state.minutes);
    }

    /// Directs alerts to `channel`. The channel must belong to the group and
    /// grant send permission; nothing is mutated otherwise.
    pub async fn set_alert_channel(&self, channel: &str) -> Result<(), ScheduleError> {
        if !self
            .ctx
            .directory
            .channels()
            .iter()
            .any(|known| known == channel)
        {
            return Err(ScheduleError::NotFound);
        }
        if !self.ctx.directory.can_send(channel) {
            return Err(ScheduleError::PermissionDenied);
        }
        let mut state = self.ctx.state.lock().await;
        state.alert_channel = Some(channel.to_string());
        self.ctx.store.save_alert_channel(state.alert_channel.as_deref());
        Ok(())
    }

    /// Falls back to auto-discovery: the first channel the bot may send in,
    /// which may legitimately be none.
    pub async fn reset_alert_channel(&self) {
        let fallback = first_sendable(self.ctx.directory.as_ref());
        let mut state = self.ctx.state.lock().await;
        state.alert_channel = fallback;
        self.ctx.store.save_alert_channel(state.alert_channel.as_deref());
    }

    pub async fn meetings(&self) -> Vec<TimePoint> {
        self.ctx.state.lock().await.meetings.iter().copied().collect()
    }

    /// Weekly meetings in occurrence order, the same order removal positions
    /// refer to.
    pub async fn weekly_meetings(&self) -> Vec<WeeklySlot> {
        self.ctx.state.lock().await.weekly.iter().cloned().collect()
    }

    pub async fn birthdays(&self) -> Vec<Birthday> {
        self.ctx.state.lock().await.birthdays.iter().cloned().collect()
    }

    pub async fn agenda(&self) -> RotationList {
        self.ctx.state.lock().await.agenda.clone()
    }

    pub async fn minutes(&self) -> RotationList {
        self.ctx.state.lock().await.minutes.clone()
    }

    pub async fn alert_channel(&self) -> Option<String> {
        self.ctx.state.lock().await.alert_channel.clone()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &Arc<Mutex<GroupState>> {
        &self.ctx.state
    }

    /// Reconciles the alert loops with an entry freshly inserted at
    /// 0-based `position`, and persists the category.
    async fn coordinate_insert(&self, category: Category, position: usize) {
        let effect = {
            let mut state = self.ctx.state.lock().await;
            let cursor = state.cursor(category);
            let effect = match position.cmp(&cursor) {
                Ordering::Greater => InsertEffect::Beyond,
                Ordering::Equal => InsertEffect::AtCursor,
                Ordering::Less => {
                    let message = state.soon_message(category, position, self.ctx.lead);
                    state.set_cursor(category, cursor + 1);
                    InsertEffect::BeforeCursor {
                        front: position == 0,
                        message,
                    }
                }
            };
            persist_category(&self.ctx.store, &state, category);
            effect
        };

        match effect {
            InsertEffect::Beyond => {}
            InsertEffect::AtCursor => {
                self.ctx
                    .loops
                    .lock()
                    .await
                    .restart_soon(self.ctx.clone(), category);
            }
            InsertEffect::BeforeCursor { front, message } => {
                // A new earliest entry invalidates the now loop's in-flight
                // sleep; it must not observe the list mid-update, so it stays
                // stopped until the synchronous warning went out.
                if front {
                    self.ctx.loops.lock().await.stop_now(category);
                }
                if let Some(body) = message {
                    deliver(&self.ctx, &body).await;
                }
                self.ctx
                    .loops
                    .lock()
                    .await
                    .restart_now(self.ctx.clone(), category);
            }
        }
    }

    async fn remove_positions(
        &self,
        category: Category,
        positions: &[usize],
    ) -> Result<(), ScheduleError> {
        let (front_removed, waited_on_removed) = {
            let mut state = self.ctx.state.lock().await;
            let cursor = state.cursor(category);
            let removed = match category {
                Category::Meetings => state.meetings.remove_at(positions),
                Category::Weekly => state.weekly.remove_at(positions),
                Category::Birthdays => state.birthdays.remove_at(positions),
            };
            if !removed {
                return Err(ScheduleError::NotFound);
            }
            let mut unique = positions.to_vec();
            unique.sort_unstable();
            unique.dedup();
            // The cursor shrinks by the number of removed entries that were
            // strictly before it.
            let before_cursor = unique.iter().filter(|&&position| position <= cursor).count();
            let adjusted = cursor.saturating_sub(before_cursor).min(state.len(category));
            state.set_cursor(category, adjusted);
            persist_category(&self.ctx.store, &state, category);
            (unique.contains(&1), unique.contains(&(cursor + 1)))
        };
        info!("removed {} entries from {}", positions.len(), category.label());

        let mut loops = self.ctx.loops.lock().await;
        if waited_on_removed {
            loops.restart_soon(self.ctx.clone(), category);
        }
        if front_removed {
            loops.restart_now(self.ctx.clone(), category);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::{MockChannelDirectory, MockNotifier};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tempfile::{tempdir, TempDir};

    struct RecordingNotifier {
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _channel: &str, body: &str) -> bool {
            self.sent.lock().unwrap().push(body.to_string());
            true
        }
    }

    fn silent_notifier() -> Arc<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().returning(|_, _| true);
        Arc::new(notifier)
    }

    /// Directory with a sendable "general" channel and a locked "archive".
    fn test_directory() -> Arc<dyn ChannelDirectory> {
        let mut directory = MockChannelDirectory::new();
        directory
            .expect_channels()
            .returning(|| vec!["general".to_string(), "archive".to_string()]);
        directory
            .expect_can_send()
            .returning(|channel| channel == "general");
        Arc::new(directory)
    }

    fn create_test_schedule(dir: &TempDir) -> GroupSchedule {
        create_test_schedule_with(dir, silent_notifier(), &Config::default())
    }

    fn create_test_schedule_with(
        dir: &TempDir,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> GroupSchedule {
        GroupSchedule::new(dir.path(), "42", "test group", notifier, test_directory(), config)
    }

    fn in_hours(hours: i64) -> TimePoint {
        Local::now() + Duration::hours(hours)
    }

    #[tokio::test]
    async fn test_add_meeting_rejects_past_time() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);

        let result = schedule.add_meeting(Local::now() - Duration::hours(1)).await;
        assert!(matches!(result, Err(ScheduleError::Validation(_))));
        assert!(schedule.meetings().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_meeting_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        let time = in_hours(2);

        assert!(schedule.add_meeting(time).await.is_ok());
        assert_eq!(
            schedule.add_meeting(time).await,
            Err(ScheduleError::DuplicateEntry)
        );
        assert_eq!(schedule.meetings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_meeting_rejects_over_capacity() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.limits.max_meetings = 1;
        let schedule = create_test_schedule_with(&dir, silent_notifier(), &config);

        assert!(schedule.add_meeting(in_hours(1)).await.is_ok());
        assert_eq!(
            schedule.add_meeting(in_hours(2)).await,
            Err(ScheduleError::CapacityExceeded(1))
        );
    }

    #[tokio::test]
    async fn test_add_meeting_before_cursor_fires_immediate_warning() {
        let dir = tempdir().unwrap();
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier {
            sent: Arc::clone(&sent),
        });
        let schedule = create_test_schedule_with(&dir, notifier, &Config::default());

        assert!(schedule.add_meeting(in_hours(2)).await.is_ok());
        {
            // Pretend the soon loop already warned about it.
            let mut state = schedule.state().lock().await;
            state.meeting_index = 1;
        }

        assert!(schedule.add_meeting(in_hours(1)).await.is_ok());

        let messages = sent.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Reminder"));
        drop(messages);
        let state = schedule.state().lock().await;
        assert_eq!(state.meeting_index, 2);
    }

    #[tokio::test]
    async fn test_add_birthday_duplicate_rules() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);

        assert!(schedule.add_birthday(3, 3, "Sam").await.is_ok());
        assert_eq!(
            schedule.add_birthday(3, 3, "Sam").await,
            Err(ScheduleError::DuplicateEntry)
        );
        // Same day, different name is a distinct entry.
        assert!(schedule.add_birthday(3, 3, "Alex").await.is_ok());
        assert_eq!(schedule.birthdays().await.len(), 2);
    }

    #[tokio::test]
    async fn test_add_birthday_rejects_impossible_day() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);

        assert!(matches!(
            schedule.add_birthday(4, 31, "Nobody").await,
            Err(ScheduleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_weekly_meeting_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        let meeting = WeeklyMeeting::new(2, 10, 0).unwrap();

        assert!(schedule.add_weekly_meeting(meeting).await.is_ok());
        assert_eq!(
            schedule.add_weekly_meeting(meeting).await,
            Err(ScheduleError::DuplicateEntry)
        );
    }

    #[tokio::test]
    async fn test_remove_meetings_shifts_cursor() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        for hours in [1, 2, 3] {
            assert!(schedule.add_meeting(in_hours(hours)).await.is_ok());
        }
        {
            let mut state = schedule.state().lock().await;
            state.meeting_index = 2;
        }

        assert!(schedule.remove_meetings(&[1]).await.is_ok());

        assert_eq!(schedule.meetings().await.len(), 2);
        let state = schedule.state().lock().await;
        assert_eq!(state.meeting_index, 1);
    }

    #[tokio::test]
    async fn test_remove_meetings_is_all_or_nothing() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        assert!(schedule.add_meeting(in_hours(1)).await.is_ok());

        assert_eq!(
            schedule.remove_meetings(&[1, 5]).await,
            Err(ScheduleError::NotFound)
        );
        assert_eq!(schedule.meetings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_birthday_by_identity() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        assert!(schedule.add_birthday(3, 3, "Sam").await.is_ok());

        assert_eq!(
            schedule.remove_birthday(3, 3, "Alex").await,
            Err(ScheduleError::NotFound)
        );
        assert!(schedule.remove_birthday(3, 3, "Sam").await.is_ok());
        assert!(schedule.birthdays().await.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_add_list_remove() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);

        assert!(schedule.add_meeting(in_hours(48)).await.is_ok());
        assert_eq!(schedule.meetings().await.len(), 1);

        assert!(schedule.remove_meetings(&[1]).await.is_ok());
        assert!(schedule.meetings().await.is_empty());

        // The empty schedule was persisted too.
        let reloaded = create_test_schedule(&dir);
        assert!(reloaded.meetings().await.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_orders() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);
        let names = vec!["Glen".to_string(), "Holly".to_string()];

        assert!(schedule.set_agenda_order(names.clone()).await.is_ok());
        assert_eq!(
            schedule.set_agenda_order(vec!["X".to_string(), "X".to_string()]).await,
            Err(ScheduleError::DuplicateEntry)
        );
        assert_eq!(schedule.agenda().await.names(), names.as_slice());

        assert!(schedule.set_agenda_to("Holly").await.is_ok());
        assert_eq!(schedule.agenda().await.current(), Some("Holly"));
        assert_eq!(
            schedule.set_agenda_to("Nobody").await,
            Err(ScheduleError::NotFound)
        );

        schedule.advance_agenda(1).await;
        assert_eq!(schedule.agenda().await.current(), Some("Glen"));

        schedule.clear_agenda_order().await;
        assert!(schedule.agenda().await.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_order_rejected_at_max_length() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.limits.max_rotation = 3;
        let schedule = create_test_schedule_with(&dir, silent_notifier(), &config);

        // A list of exactly max_rotation names is already over the line.
        assert_eq!(
            schedule
                .set_minutes_order(vec!["A".to_string(), "B".to_string(), "C".to_string()])
                .await,
            Err(ScheduleError::CapacityExceeded(3))
        );
        assert!(schedule
            .set_minutes_order(vec!["A".to_string(), "B".to_string()])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_alert_channel_rules() {
        let dir = tempdir().unwrap();
        let schedule = create_test_schedule(&dir);

        // Auto-discovered at construction.
        assert_eq!(schedule.alert_channel().await.as_deref(), Some("general"));

        assert_eq!(
            schedule.set_alert_channel("elsewhere").await,
            Err(ScheduleError::NotFound)
        );
        assert_eq!(
            schedule.set_alert_channel("archive").await,
            Err(ScheduleError::PermissionDenied)
        );
        assert_eq!(schedule.alert_channel().await.as_deref(), Some("general"));

        assert!(schedule.set_alert_channel("general").await.is_ok());
        schedule.reset_alert_channel().await;
        assert_eq!(schedule.alert_channel().await.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_schedule_survives_reconstruction() {
        let dir = tempdir().unwrap();
        let time = in_hours(72);
        {
            let schedule = create_test_schedule(&dir);
            assert!(schedule.add_meeting(time).await.is_ok());
            assert!(schedule.add_birthday(12, 1, "Josh").await.is_ok());
            assert!(schedule
                .set_minutes_order(vec!["Glen".to_string(), "Holly".to_string()])
                .await
                .is_ok());
        }

        let reloaded = create_test_schedule(&dir);
        assert_eq!(reloaded.meetings().await.len(), 1);
        assert_eq!(reloaded.birthdays().await.len(), 1);
        assert_eq!(reloaded.minutes().await.current(), Some("Glen"));
    }
}
