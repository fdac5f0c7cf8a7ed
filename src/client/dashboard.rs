//! Dashboard-wide session state and the events that update it.

use crate::common::types::{DashboardStats, HookAlert, SessionSummary};
use serde_json::Value;

/// Output of the dispatcher, consumed by the UI loop in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// Full state; replaces sessions and stats together
    Snapshot {
        sessions: Vec<SessionSummary>,
        stats: DashboardStats,
    },
    /// New session collection; stats only when the server sent them
    SessionsReplaced {
        sessions: Vec<SessionSummary>,
        stats: Option<DashboardStats>,
    },
    HookAlert(HookAlert),
    WebSession { session_id: String, message: Value },
}

/// Sessions in server order plus the server's aggregate counters
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    sessions: Vec<SessionSummary>,
    stats: Option<DashboardStats>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, sessions: Vec<SessionSummary>, stats: DashboardStats) {
        self.sessions = sessions;
        self.stats = Some(stats);
    }

    pub fn replace_sessions(&mut self, sessions: Vec<SessionSummary>) {
        self.sessions = sessions;
    }

    pub fn replace_stats(&mut self, stats: DashboardStats) {
        self.stats = Some(stats);
    }

    pub fn session(&self, id: &str) -> Option<&SessionSummary> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    /// `None` until the first `init`
    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }
}
