//! Bounded, most-recent-first alert list with age-based eviction and the
//! persisted notification settings.

use crate::common::logging::Logger;
use crate::common::persistence::SettingsStorage;
use crate::common::types::HookAlert;
use crate::error::OrchestratorError;
use crate::notify::settings::{NotificationSettings, SettingsPatch};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::time::Duration as StdDuration;

/// Default bound on retained alerts
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 50;

/// How often the age sweep runs
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(10);

pub struct NotificationStore {
    alerts: VecDeque<HookAlert>,
    max_size: usize,
    settings: NotificationSettings,
    storage: Box<dyn SettingsStorage>,
    log: Logger,
}

impl NotificationStore {
    /// Create a store, loading settings from storage merged over defaults
    pub fn new(storage: Box<dyn SettingsStorage>, max_size: usize) -> Self {
        let log = Logger::root().child("notifications");
        let (settings, load_error) = NotificationSettings::load(storage.as_ref());
        if let Some(e) = load_error {
            log.warn(format_args!("ignoring malformed notification settings: {}", e));
        }
        Self {
            alerts: VecDeque::new(),
            max_size: max_size.max(1),
            settings,
            storage,
            log,
        }
    }

    /// Prepend an alert, dropping the oldest entries beyond the bound
    pub fn add(&mut self, alert: HookAlert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(self.max_size);
    }

    /// Remove the alert at `index`. Out-of-range indices are a no-op.
    pub fn dismiss(&mut self, index: usize) -> Option<HookAlert> {
        self.alerts.remove(index)
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn alerts(&self) -> impl Iterator<Item = &HookAlert> {
        self.alerts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HookAlert> {
        self.alerts.get(index)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether the periodic sweep should run at all
    pub fn sweep_enabled(&self) -> bool {
        self.settings.auto_delete_minutes > 0
    }

    /// Drop alerts older than `autoDeleteMinutes` as of `now`. Returns the
    /// number removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        if !self.sweep_enabled() {
            return 0;
        }
        // Beyond chrono's range nothing can be old enough to expire
        let Some(ttl) = Duration::try_minutes(self.settings.auto_delete_minutes) else {
            return 0;
        };
        let before = self.alerts.len();
        self.alerts
            .retain(|alert| now.signed_duration_since(alert.received_at) <= ttl);
        let removed = before - self.alerts.len();
        if removed > 0 {
            self.log.debug(format_args!("swept {} expired alert(s)", removed));
        }
        removed
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Merge a patch and persist the result immediately.
    ///
    /// The in-memory settings are updated even when the write fails; the
    /// error is returned so the caller can surface it.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<&NotificationSettings, OrchestratorError> {
        self.settings.merge(patch);
        if let Err(e) = self.settings.persist(self.storage.as_ref()) {
            self.log.error(format_args!("failed to persist settings: {}", e));
            return Err(e);
        }
        Ok(&self.settings)
    }
}
