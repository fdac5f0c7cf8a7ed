//! OS-level notifications for hook alerts.

use crate::common::logging::Logger;
use crate::common::types::{HookAlert, HookType};
use crate::notify::settings::NotificationSettings;
use async_trait::async_trait;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const APP_NAME: &str = "claude-dash";

/// Body used when an alert carries no preview
pub const FALLBACK_BODY: &str = "Needs your attention";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet
    Default,
    Granted,
    Denied,
}

/// A notification ready for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other instead of stacking
    pub tag: String,
    /// Stay on screen until the user dismisses it
    pub require_interaction: bool,
}

impl DesktopNotification {
    pub fn for_alert(alert: &HookAlert) -> Self {
        let detail = alert.hook.preview.as_deref().unwrap_or(FALLBACK_BODY);
        Self {
            title: title_for(alert.hook.hook_type, &alert.hook.tool_name),
            body: format!("{}: {}", alert.session_name, detail),
            tag: alert.hook.tool_use_id.clone(),
            require_interaction: true,
        }
    }
}

fn title_for(hook: HookType, tool_name: &str) -> String {
    match hook {
        HookType::Bash => "Bash command needs approval".to_string(),
        HookType::Edit => format!("{} needs approval", tool_name),
        HookType::Plan => "Plan ready for review".to_string(),
        HookType::Question => "Claude has a question".to_string(),
    }
}

/// Host capability for system notifications
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Whether the host can show notifications at all
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    async fn request_permission(&self) -> Permission;

    fn show(&self, notification: &DesktopNotification) -> std::io::Result<()>;
}

/// Gate between hook alerts and the host's notification center
#[derive(Clone)]
pub struct DesktopAlerts {
    backend: Arc<dyn NotificationBackend>,
    log: Logger,
}

impl DesktopAlerts {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self {
            backend,
            log: Logger::root().child("desktop"),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemBackend::detect()))
    }

    pub fn permission(&self) -> Permission {
        if self.backend.is_supported() {
            self.backend.permission()
        } else {
            Permission::Denied
        }
    }

    /// Resolve to whether permission is (now) granted. Never prompts on a
    /// host without notification support.
    pub async fn request_permission(&self) -> bool {
        if !self.backend.is_supported() {
            return false;
        }
        match self.backend.permission() {
            Permission::Granted => true,
            Permission::Denied => false,
            Permission::Default => self.backend.request_permission().await == Permission::Granted,
        }
    }

    /// Show an alert if the user enabled system notifications and the host
    /// granted permission. Returns whether a notification was emitted.
    pub fn show(&self, alert: &HookAlert, settings: &NotificationSettings) -> bool {
        if !settings.browser_notifications || self.permission() != Permission::Granted {
            return false;
        }
        let notification = DesktopNotification::for_alert(alert);
        match self.backend.show(&notification) {
            Ok(()) => true,
            Err(e) => {
                self.log.warn(format_args!("failed to show notification: {}", e));
                false
            }
        }
    }
}

/// Which notifier binary the host offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notifier {
    /// macOS, supports replacement via `-group`
    TerminalNotifier,
    /// macOS fallback, no replacement
    Osascript,
    /// Linux (libnotify)
    NotifySend,
    None,
}

/// Shells out to the platform notifier
pub struct SystemBackend {
    notifier: Notifier,
    granted: AtomicBool,
}

impl SystemBackend {
    pub fn detect() -> Self {
        let notifier = if cfg!(target_os = "macos") {
            if is_available("terminal-notifier") {
                Notifier::TerminalNotifier
            } else {
                Notifier::Osascript
            }
        } else if cfg!(target_os = "linux") && is_available("notify-send") {
            Notifier::NotifySend
        } else {
            Notifier::None
        };
        Self {
            notifier,
            granted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl NotificationBackend for SystemBackend {
    fn is_supported(&self) -> bool {
        self.notifier != Notifier::None
    }

    fn permission(&self) -> Permission {
        if self.granted.load(Ordering::SeqCst) {
            Permission::Granted
        } else {
            Permission::Default
        }
    }

    async fn request_permission(&self) -> Permission {
        // Local notifiers have no consent prompt; a capable host grants.
        if self.is_supported() {
            self.granted.store(true, Ordering::SeqCst);
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn show(&self, n: &DesktopNotification) -> std::io::Result<()> {
        let output = match self.notifier {
            Notifier::TerminalNotifier => Command::new("terminal-notifier")
                .args(["-title", &n.title, "-message", &n.body, "-group", &n.tag, "-sound", "default"])
                .output()?,
            Notifier::Osascript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    n.body.replace('"', "\\\""),
                    n.title.replace('"', "\\\"")
                );
                Command::new("osascript").args(["-e", &script]).output()?
            }
            Notifier::NotifySend => {
                let urgency = if n.require_interaction { "critical" } else { "normal" };
                let replace_hint = format!("string:x-canonical-private-synchronous:{}", n.tag);
                Command::new("notify-send")
                    .args(["-a", APP_NAME, "-u", urgency, "-h", &replace_hint, &n.title, &n.body])
                    .output()?
            }
            Notifier::None => return Ok(()),
        };
        if output.status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

fn is_available(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
