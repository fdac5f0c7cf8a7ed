//! TUI application state and logic.

use crate::client::connection::ConnectionState;
use crate::client::dashboard::{DashboardEvent, DashboardState};
use crate::client::dispatcher::Listeners;
use crate::client::subscriptions::{ResubscribePolicy, SubscriptionRegistry, Subscriptions};
use crate::common::logging::{log_handle, Logger};
use crate::common::types::{HookAlert, SessionSummary};
use crate::error::OrchestratorError;
use crate::notify::desktop::DesktopAlerts;
use crate::notify::settings::SettingsPatch;
use crate::notify::store::NotificationStore;
use crate::notify::sound::SoundScheduler;
use chrono::{DateTime, Utc};
use crossterm::event::KeyCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Lines of live output kept for the focused session
pub const SESSION_LOG_LIMIT: usize = 200;

/// How long a status message stays in the footer
const STATUS_TTL: Duration = Duration::from_secs(4);

/// What the event loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    /// Ask the host for notification permission off the UI path
    RequestPermission,
}

/// TUI application state
pub struct App {
    pub dashboard: DashboardState,
    pub store: NotificationStore,
    pub sound: SoundScheduler,
    pub desktop: DesktopAlerts,
    pub subscriptions: Subscriptions,
    pub registry: SubscriptionRegistry,
    pub connection: ConnectionState,
    pub server: String,
    pub selected: usize,
    // Session whose live output is shown and subscribed
    pub focused: Option<String>,
    pub session_log: VecDeque<String>,
    pub status_message: Option<(String, Instant)>,
    log: Logger,
}

impl App {
    pub fn new(
        server: String,
        store: NotificationStore,
        sound: SoundScheduler,
        desktop: DesktopAlerts,
        subscriptions: Subscriptions,
        policy: ResubscribePolicy,
    ) -> Self {
        Self {
            dashboard: DashboardState::new(),
            store,
            sound,
            desktop,
            subscriptions,
            registry: SubscriptionRegistry::new(policy),
            connection: ConnectionState::Connecting,
            server,
            selected: 0,
            focused: None,
            session_log: VecDeque::new(),
            status_message: None,
            log: Logger::root().child("app"),
        }
    }

    /// Listener set reflecting the current settings
    pub fn listeners(&self, events: mpsc::UnboundedSender<DashboardEvent>) -> Listeners {
        Listeners {
            events,
            enabled_hooks: self.store.settings().enabled_hooks,
        }
    }

    pub fn apply(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Snapshot { sessions, stats } => {
                self.dashboard.apply_snapshot(sessions, stats);
                self.clamp_selection();
            }
            DashboardEvent::SessionsReplaced { sessions, stats } => {
                self.dashboard.replace_sessions(sessions);
                if let Some(stats) = stats {
                    self.dashboard.replace_stats(stats);
                }
                self.clamp_selection();
            }
            DashboardEvent::HookAlert(alert) => self.on_hook_alert(alert),
            DashboardEvent::WebSession { session_id, message } => {
                if self.focused.as_deref() == Some(session_id.as_str()) {
                    self.session_log.push_back(describe_message(&message));
                    while self.session_log.len() > SESSION_LOG_LIMIT {
                        self.session_log.pop_front();
                    }
                }
            }
        }
    }

    /// Sound and desktop notification first, then the alert list
    pub fn on_hook_alert(&mut self, alert: HookAlert) {
        let settings = self.store.settings().clone();
        self.sound.play(&settings.sound_type, settings.sound_enabled);
        self.desktop.show(&alert, &settings);
        self.log.info(format_args!(
            "{} hook from {} ({})",
            alert.hook.hook_type.label(),
            alert.session_name,
            alert.hook.tool_name
        ));
        self.store.add(alert);
    }

    pub fn on_connection_state(&mut self, state: ConnectionState) {
        if state == self.connection {
            return;
        }
        self.connection = state;
        let reissued = self.registry.on_connection_state(state, &self.subscriptions);
        if state == ConnectionState::Open && self.focused.is_some() {
            if reissued > 0 {
                self.set_status("Reconnected; live output resumed".to_string());
            } else if self.registry.policy() == ResubscribePolicy::Manual {
                self.set_status("Reconnected; press Enter to resume live output".to_string());
            }
        }
    }

    pub fn selected_session(&self) -> Option<&SessionSummary> {
        self.dashboard.sessions().get(self.selected)
    }

    pub fn move_selection_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        if self.selected + 1 < self.dashboard.sessions().len() {
            self.selected += 1;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.dashboard.sessions().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Focus the selected session and subscribe to its live output
    pub fn focus_selected(&mut self) -> Result<(), OrchestratorError> {
        let id = self
            .selected_session()
            .map(|s| s.id.clone())
            .ok_or_else(|| OrchestratorError::not_found("no session selected"))?;
        if self.focused.as_deref() == Some(id.as_str()) {
            return Ok(());
        }
        if self.focused.is_some() {
            self.unfocus()?;
        }

        self.registry.track(&id);
        if !self.subscriptions.subscribe(&id) {
            self.set_status("Not connected; live output starts after reconnect".to_string());
        }
        self.focused = Some(id);
        self.session_log.clear();
        Ok(())
    }

    pub fn unfocus(&mut self) -> Result<(), OrchestratorError> {
        let id = self
            .focused
            .take()
            .ok_or_else(|| OrchestratorError::session("no session is focused"))?;
        self.registry.untrack(&id);
        self.subscriptions.unsubscribe(&id);
        self.session_log.clear();
        Ok(())
    }

    pub fn handle_key(&mut self, code: KeyCode) -> KeyAction {
        match code {
            KeyCode::Char('q') => return KeyAction::Quit,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection_up(),
            KeyCode::Enter => {
                if let Err(e) = self.focus_selected() {
                    self.set_status(e.to_string());
                }
            }
            KeyCode::Esc => {
                if let Err(e) = self.unfocus() {
                    self.set_status(e.to_string());
                }
            }
            KeyCode::Char('d') => {
                self.store.dismiss(0);
            }
            KeyCode::Char('c') => self.store.clear(),
            KeyCode::Char('s') => {
                let enabled = !self.store.settings().sound_enabled;
                self.update_settings(SettingsPatch {
                    sound_enabled: Some(enabled),
                    ..Default::default()
                });
                self.set_status(format!("Sound {}", if enabled { "ON" } else { "OFF" }));
            }
            KeyCode::Char('n') => {
                if self.store.settings().browser_notifications {
                    self.update_settings(SettingsPatch {
                        browser_notifications: Some(false),
                        ..Default::default()
                    });
                    self.set_status("System notifications OFF".to_string());
                } else {
                    return KeyAction::RequestPermission;
                }
            }
            KeyCode::Char('v') => self.toggle_verbose_logging(),
            _ => {}
        }
        KeyAction::None
    }

    fn toggle_verbose_logging(&mut self) {
        let Some(handle) = log_handle() else {
            self.set_status("Logging is not initialized".to_string());
            return;
        };
        match handle.toggle_verbose() {
            Ok(verbose) => {
                self.log.info(format_args!("verbose logging {}", if verbose { "on" } else { "off" }));
                self.set_status(format!(
                    "Verbose logging {} ({})",
                    if verbose { "ON" } else { "OFF" },
                    handle.path().display()
                ));
            }
            Err(e) => self.set_status(format!("Log level unchanged: {}", e)),
        }
    }

    /// Result of a permission request started by `n`
    pub fn on_permission_result(&mut self, granted: bool) {
        if granted {
            self.update_settings(SettingsPatch {
                browser_notifications: Some(true),
                ..Default::default()
            });
            self.set_status("System notifications ON".to_string());
        } else {
            self.set_status("System notifications are not available".to_string());
        }
    }

    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        self.store.sweep_expired(now)
    }

    fn update_settings(&mut self, patch: SettingsPatch) {
        if let Err(e) = self.store.update_settings(patch) {
            self.set_status(format!("Settings not saved: {}", e));
        }
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    pub fn clear_old_status(&mut self) {
        if let Some((_, at)) = &self.status_message {
            if at.elapsed() > STATUS_TTL {
                self.status_message = None;
            }
        }
    }
}

/// One display line for a live session message
pub fn describe_message(message: &Value) -> String {
    match message {
        Value::String(text) => text.clone(),
        Value::Object(map) => ["text", "content", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string()),
        other => other.to_string(),
    }
}
