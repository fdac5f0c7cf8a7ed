//! Per-session detail subscriptions.

use crate::client::connection::{ConnectionState, Link};
use crate::common::logging::Logger;
use crate::ipc::messages::ClientFrame;
use std::collections::BTreeSet;
use tokio::sync::watch;

/// Sends subscribe/unsubscribe control frames over the current channel.
///
/// Keeps no record of what is subscribed. A call made while the channel is
/// not open sends nothing.
#[derive(Clone)]
pub struct Subscriptions {
    link: watch::Receiver<Link>,
    log: Logger,
}

impl Subscriptions {
    pub fn new(link: watch::Receiver<Link>, log: Logger) -> Self {
        Self { link, log }
    }

    /// Returns whether a frame was queued on the open channel
    pub fn subscribe(&self, session_id: &str) -> bool {
        self.send(ClientFrame::SubscribeWebSession {
            session_id: session_id.to_string(),
        })
    }

    pub fn unsubscribe(&self, session_id: &str) -> bool {
        self.send(ClientFrame::UnsubscribeWebSession {
            session_id: session_id.to_string(),
        })
    }

    fn send(&self, frame: ClientFrame) -> bool {
        let link = self.link.borrow();
        let Link::Open(outbound) = &*link else {
            self.log.debug(format_args!("channel not open; dropped {:?}", frame));
            return false;
        };
        match serde_json::to_string(&frame) {
            Ok(text) => outbound.send(text).is_ok(),
            Err(e) => {
                self.log.error(format_args!("failed to encode {:?}: {}", frame, e));
                false
            }
        }
    }
}

/// What happens to tracked subscriptions when a channel (re)opens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResubscribePolicy {
    /// Nothing is re-sent; the caller subscribes again itself
    #[default]
    Manual,
    /// Every tracked session is subscribed again on open
    Automatic,
}

/// The caller's record of sessions it wants detail for
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    policy: ResubscribePolicy,
    sessions: BTreeSet<String>,
}

impl SubscriptionRegistry {
    pub fn new(policy: ResubscribePolicy) -> Self {
        Self {
            policy,
            sessions: BTreeSet::new(),
        }
    }

    pub fn policy(&self) -> ResubscribePolicy {
        self.policy
    }

    /// Returns false if the session was already tracked
    pub fn track(&mut self, session_id: &str) -> bool {
        self.sessions.insert(session_id.to_string())
    }

    pub fn untrack(&mut self, session_id: &str) -> bool {
        self.sessions.remove(session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains(session_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sessions.iter().map(String::as_str)
    }

    /// React to a connection state change. Returns how many subscriptions
    /// were re-issued.
    pub fn on_connection_state(&self, state: ConnectionState, subscriptions: &Subscriptions) -> usize {
        if self.policy != ResubscribePolicy::Automatic || state != ConnectionState::Open {
            return 0;
        }
        self.sessions
            .iter()
            .filter(|id| subscriptions.subscribe(id))
            .count()
    }
}
