//! Decodes inbound frames and routes them to dashboard events.

use crate::client::dashboard::DashboardEvent;
use crate::common::logging::Logger;
use crate::common::types::HookAlert;
use crate::ipc::messages::ServerFrame;
use crate::notify::settings::EnabledHooks;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

/// Callback targets and filters for the live connection.
///
/// Held in a `watch` cell: the connection reads the latest value for every
/// frame, so replacing it never tears the channel down.
#[derive(Debug, Clone)]
pub struct Listeners {
    pub events: mpsc::UnboundedSender<DashboardEvent>,
    pub enabled_hooks: EnabledHooks,
}

pub struct Dispatcher {
    listeners: watch::Receiver<Listeners>,
    log: Logger,
}

impl Dispatcher {
    pub fn new(listeners: watch::Receiver<Listeners>, log: Logger) -> Self {
        Self { listeners, log }
    }

    /// Handle one raw frame. Bad frames are logged and skipped.
    pub fn handle_text(&self, raw: &str) {
        let frame = match ServerFrame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.log.warn(format_args!("skipping frame: {}", e));
                return;
            }
        };

        let listeners = self.listeners.borrow().clone();
        if let Some(event) = route(frame, &listeners.enabled_hooks, Utc::now()) {
            if listeners.events.send(event).is_err() {
                self.log.debug("no event consumer; frame dropped");
            }
        }
    }
}

/// Map a decoded frame to the event it produces, if any
pub fn route(frame: ServerFrame, enabled_hooks: &EnabledHooks, now: DateTime<Utc>) -> Option<DashboardEvent> {
    match frame {
        ServerFrame::Init { sessions, stats } => Some(DashboardEvent::Snapshot { sessions, stats }),
        ServerFrame::SessionsUpdate { sessions, stats } => Some(DashboardEvent::SessionsReplaced { sessions, stats }),
        ServerFrame::HookAlert(payload) => {
            if enabled_hooks.is_enabled(payload.hook.hook_type) {
                Some(DashboardEvent::HookAlert(HookAlert::received(payload, now)))
            } else {
                None
            }
        }
        ServerFrame::WebSession { session_id, message } => Some(DashboardEvent::WebSession { session_id, message }),
        ServerFrame::Unknown(_) => None,
    }
}
