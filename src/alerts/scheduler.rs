//! Wait-then-fire alert loops.
//!
//! Each category runs two independent tasks. The soon loop walks the cursor
//! forward, warning a lead time before each entry; the now loop waits on the
//! earliest warned entry, announces it and retires or reschedules it. Both
//! loops exit on their own when nothing is left to wait on; mutations that
//! invalidate an in-flight sleep cancel and respawn the affected loop instead
//! of letting it wake on stale data. Sleeping tasks re-check the state after
//! waking before acting, so a wake against an already-changed schedule falls
//! through harmlessly.

use std::sync::Arc;

use chrono::{Duration, Local};
use log::{debug, error, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::announce::{first_sendable, send_chunked, ChannelDirectory, Notifier};
use crate::schedule::{Category, GroupState, TimePoint};
use crate::storage::GroupStore;

/// Everything a loop task needs, cheap to clone into each spawn.
#[derive(Clone)]
pub struct LoopCtx {
    pub state: Arc<Mutex<GroupState>>,
    pub loops: Arc<Mutex<AlertLoops>>,
    pub store: GroupStore,
    pub notifier: Arc<dyn Notifier>,
    pub directory: Arc<dyn ChannelDirectory>,
    /// How long before an event its "soon" warning fires.
    pub lead: Duration,
}

/// Handle to one loop task, in states not-running or running.
#[derive(Default)]
pub struct LoopHandle {
    task: Option<JoinHandle<()>>,
}

impl LoopHandle {
    pub fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the task if one is still live.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
            }
        }
    }

    /// Spawns a fresh task only when no live one exists.
    pub fn start(&mut self, spawn: impl FnOnce() -> JoinHandle<()>) {
        if !self.is_live() {
            self.task = Some(spawn());
        }
    }

    pub fn restart(&mut self, spawn: impl FnOnce() -> JoinHandle<()>) {
        self.stop();
        self.task = Some(spawn());
    }
}

#[derive(Default)]
struct CategoryLoops {
    soon: LoopHandle,
    now: LoopHandle,
}

/// The six loop handles of one group (soon/now per category), plus whether
/// the group's alerting is active at all. While inactive, restarts are
/// ignored so stopped loops stay stopped.
#[derive(Default)]
pub struct AlertLoops {
    active: bool,
    meetings: CategoryLoops,
    weekly: CategoryLoops,
    birthdays: CategoryLoops,
}

impl AlertLoops {
    pub fn start_all(&mut self, ctx: LoopCtx) {
        self.active = true;
        for category in Category::ALL {
            self.restart_soon(ctx.clone(), category);
            self.restart_now(ctx.clone(), category);
        }
    }

    pub fn stop_all(&mut self) {
        self.active = false;
        for category in Category::ALL {
            let loops = self.of(category);
            loops.soon.stop();
            loops.now.stop();
        }
    }

    pub fn restart_soon(&mut self, ctx: LoopCtx, category: Category) {
        if !self.active {
            return;
        }
        self.of(category)
            .soon
            .restart(|| spawn_soon_loop(ctx, category));
    }

    pub fn restart_now(&mut self, ctx: LoopCtx, category: Category) {
        if !self.active {
            return;
        }
        self.of(category)
            .now
            .restart(|| spawn_now_loop(ctx, category));
    }

    /// Spawns the soon loop if it has exited, e.g. after a rescheduled entry
    /// re-entered the "not yet warned" range.
    pub fn start_soon(&mut self, ctx: LoopCtx, category: Category) {
        if !self.active {
            return;
        }
        self.of(category)
            .soon
            .start(|| spawn_soon_loop(ctx, category));
    }

    /// Spawns the now loop if it has exited, e.g. after the soon loop warned
    /// about the first pending entry.
    pub fn start_now(&mut self, ctx: LoopCtx, category: Category) {
        if !self.active {
            return;
        }
        self.of(category)
            .now
            .start(|| spawn_now_loop(ctx, category));
    }

    pub fn stop_now(&mut self, category: Category) {
        self.of(category).now.stop();
    }

    fn of(&mut self, category: Category) -> &mut CategoryLoops {
        match category {
            Category::Meetings => &mut self.meetings,
            Category::Weekly => &mut self.weekly,
            Category::Birthdays => &mut self.birthdays,
        }
    }
}

pub fn spawn_soon_loop(ctx: LoopCtx, category: Category) -> JoinHandle<()> {
    tokio::spawn(soon_loop(ctx, category))
}

pub fn spawn_now_loop(ctx: LoopCtx, category: Category) -> JoinHandle<()> {
    tokio::spawn(now_loop(ctx, category))
}

/// While the cursor has entries ahead of it: sleep until the next one minus
/// the lead time, warn about it, advance the cursor.
async fn soon_loop(ctx: LoopCtx, category: Category) {
    debug!("{} soon loop started", category.label());
    loop {
        let target = {
            let state = ctx.state.lock().await;
            match state.occurrence_at(category, state.cursor(category)) {
                Some(when) => when.checked_sub_signed(ctx.lead).unwrap_or(when),
                None => break,
            }
        };
        sleep_until_point(&target).await;

        let message = {
            let mut state = ctx.state.lock().await;
            let cursor = state.cursor(category);
            let Some(when) = state.occurrence_at(category, cursor) else {
                break;
            };
            // The schedule may have changed while we slept.
            if when.checked_sub_signed(ctx.lead).unwrap_or(when) > Local::now() {
                continue;
            }
            let message = state.soon_message(category, cursor, ctx.lead);
            state.set_cursor(category, cursor + 1);
            persist_category(&ctx.store, &state, category);
            message
        };
        if let Some(body) = message {
            deliver(&ctx, &body).await;
        }
        // A warned entry is now pending its "now" alert.
        ctx.loops.lock().await.start_now(ctx.clone(), category);
    }
    debug!("{} soon loop finished", category.label());
}

/// While warned entries exist: sleep until the earliest one, announce it,
/// retire or reschedule it and advance the duty rotations it drives.
async fn now_loop(ctx: LoopCtx, category: Category) {
    debug!("{} now loop started", category.label());
    loop {
        let target = {
            let state = ctx.state.lock().await;
            if state.cursor(category) == 0 {
                break;
            }
            match state.occurrence_at(category, 0) {
                Some(when) => when,
                None => break,
            }
        };
        sleep_until_point(&target).await;

        let message = {
            let mut state = ctx.state.lock().await;
            if state.cursor(category) == 0 {
                break;
            }
            let Some(when) = state.occurrence_at(category, 0) else {
                break;
            };
            if when > Local::now() {
                continue;
            }
            let message = state.now_message(category);
            state.fire_front(category);
            persist_category(&ctx.store, &state, category);
            persist_rotations(&ctx.store, &state, category);
            message
        };
        if let Some(body) = message {
            deliver(&ctx, &body).await;
        }
        // Rescheduled entries re-enter the "not yet warned" range.
        if matches!(category, Category::Weekly | Category::Birthdays) {
            ctx.loops.lock().await.start_soon(ctx.clone(), category);
        }
    }
    debug!("{} now loop finished", category.label());
}

async fn sleep_until_point(target: &TimePoint) {
    if let Ok(wait) = target.signed_duration_since(Local::now()).to_std() {
        tokio::time::sleep(wait).await;
    }
}

/// Sends an announcement to the group's alert channel. On failure the
/// channel is re-resolved through the directory and the send retried once;
/// with no viable channel the announcement is logged and dropped, never
/// fatal to the calling loop.
pub async fn deliver(ctx: &LoopCtx, body: &str) {
    let channel = { ctx.state.lock().await.alert_channel.clone() };
    let Some(channel) = channel else {
        warn!("no alert channel available, dropping announcement");
        return;
    };
    if send_chunked(ctx.notifier.as_ref(), &channel, body).await {
        return;
    }

    warn!("sending to {channel} failed, re-resolving the alert channel");
    match first_sendable(ctx.directory.as_ref()) {
        Some(fallback) if fallback != channel => {
            {
                let mut state = ctx.state.lock().await;
                state.alert_channel = Some(fallback.clone());
                ctx.store.save_alert_channel(Some(&fallback));
            }
            if !send_chunked(ctx.notifier.as_ref(), &fallback, body).await {
                error!("fallback channel {fallback} failed too, announcement dropped");
            }
        }
        _ => error!("no sendable channel, announcement dropped"),
    }
}

/// Writes a category's record after a mutation.
pub fn persist_category(store: &GroupStore, state: &GroupState, category: Category) {
    match category {
        Category::Meetings => store.save_meetings(state.meeting_index, state.meetings.as_slice()),
        Category::Weekly => store.save_weekly(state.weekly_index, state.weekly.as_slice()),
        Category::Birthdays => {
            store.save_birthdays(state.birthday_index, state.birthdays.as_slice());
        }
    }
}

/// Writes the duty rotations a fired event advanced.
fn persist_rotations(store: &GroupStore, state: &GroupState, category: Category) {
    match category {
        Category::Meetings => store.save_minutes(&state.minutes),
        Category::Weekly => {
            store.save_agenda(&state.agenda);
            store.save_minutes(&state.minutes);
        }
        Category::Birthdays => {}
    }
}
