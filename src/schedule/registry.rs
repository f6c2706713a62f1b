//! The group-to-schedule map owned by the application context.
//!
//! Schedules enter the map when the bot joins a group (or at startup for
//! groups already on disk) and leave it, with their storage purged, when the
//! bot leaves.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};

use crate::announce::{ChannelDirectory, Notifier};
use crate::config::Config;
use crate::schedule::GroupSchedule;

pub struct ScheduleRegistry {
    groups: HashMap<String, GroupSchedule>,
    root: PathBuf,
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl ScheduleRegistry {
    pub fn new(notifier: Arc<dyn Notifier>, config: Config) -> Self {
        ScheduleRegistry {
            groups: HashMap::new(),
            root: config.storage.root.clone(),
            notifier,
            config,
        }
    }

    /// Creates and registers the schedule for a group, loading whatever was
    /// persisted for it and starting its alert loops. A second join for the
    /// same group is a no-op.
    pub async fn join(
        &mut self,
        group_id: &str,
        group_name: &str,
        directory: Arc<dyn ChannelDirectory>,
    ) {
        if self.groups.contains_key(group_id) {
            debug!("group {group_id} already registered");
            return;
        }
        info!("joining group {group_id} ({group_name})");
        let schedule = GroupSchedule::new(
            &self.root,
            group_id,
            group_name,
            Arc::clone(&self.notifier),
            directory,
            &self.config,
        );
        schedule.start_alert_loops().await;
        self.groups.insert(group_id.to_string(), schedule);
    }

    /// Discards a group's schedule: loops stopped, storage removed.
    pub async fn leave(&mut self, group_id: &str) {
        if let Some(schedule) = self.groups.remove(group_id) {
            info!("leaving group {group_id}, discarding its schedule");
            schedule.stop_alert_loops().await;
            schedule.purge_storage();
        }
    }

    pub fn get(&self, group_id: &str) -> Option<&GroupSchedule> {
        self.groups.get(group_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Stops every group's alert loops. Schedules stay registered.
    pub async fn shutdown(&self) {
        for schedule in self.groups.values() {
            schedule.stop_alert_loops().await;
        }
    }
}
