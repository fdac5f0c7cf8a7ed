//! Core types used throughout the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a tracked session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Idle,
    PendingHook,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::PendingHook => write!(f, "needs attention"),
        }
    }
}

/// Kind of hook that is waiting on the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookType {
    Bash,
    Edit,
    Plan,
    Question,
}

impl HookType {
    pub const ALL: [HookType; 4] = [HookType::Bash, HookType::Edit, HookType::Plan, HookType::Question];

    pub fn label(&self) -> &'static str {
        match self {
            HookType::Bash => "bash",
            HookType::Edit => "edit",
            HookType::Plan => "plan",
            HookType::Question => "question",
        }
    }
}

/// A pending hook as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDescriptor {
    #[serde(rename = "type")]
    pub hook_type: HookType,
    pub tool_use_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// One tracked unit of agent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub project_name: String,
    #[serde(alias = "workingDirectory")]
    pub cwd: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_hook: Option<HookDescriptor>,
}

/// Aggregate counters computed by the server and stored verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub pending_hooks: u64,
    pub project_count: u64,
}

/// `hookAlert` payload as it arrives on the wire, before ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookAlertPayload {
    pub session_id: String,
    pub session_name: String,
    pub hook: HookDescriptor,
}

/// Client-side alert derived from a hook event. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookAlert {
    pub session_id: String,
    pub session_name: String,
    pub hook: HookDescriptor,
    pub received_at: DateTime<Utc>,
}

impl HookAlert {
    /// Stamp a wire payload with its ingestion time
    pub fn received(payload: HookAlertPayload, received_at: DateTime<Utc>) -> Self {
        Self {
            session_id: payload.session_id,
            session_name: payload.session_name,
            hook: payload.hook,
            received_at,
        }
    }
}

/// Truncate a string for display, counting characters rather than bytes
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a duration as human-readable "Xs" or "Xm" or "Xh"
pub fn format_duration_ago(timestamp: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(*timestamp).num_seconds();
    if secs < 0 {
        return "now".to_string();
    }
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod string_utils {
        use super::*;

        #[test]
        fn test_truncate_short() {
            assert_eq!(truncate("short", 10), "short");
        }

        #[test]
        fn test_truncate_exact() {
            assert_eq!(truncate("exactly 10", 10), "exactly 10");
        }

        #[test]
        fn test_truncate_long() {
            assert_eq!(truncate("this is too long", 10), "this is...");
        }

        #[test]
        fn test_truncate_multibyte() {
            assert_eq!(truncate("ééééééééééé", 5), "éé...");
        }

        #[test]
        fn test_format_duration_ago() {
            let now = Utc::now();
            assert_eq!(format_duration_ago(&(now - chrono::Duration::seconds(5)), now), "5s");
            assert_eq!(format_duration_ago(&(now - chrono::Duration::minutes(3)), now), "3m");
            assert_eq!(format_duration_ago(&(now - chrono::Duration::hours(2)), now), "2h");
            assert_eq!(format_duration_ago(&(now + chrono::Duration::seconds(5)), now), "now");
        }
    }

    mod wire {
        use super::*;

        #[test]
        fn test_session_summary_from_camel_case() {
            let session: SessionSummary = serde_json::from_value(json!({
                "id": "s1",
                "projectName": "api",
                "cwd": "/work/api",
                "branch": "main",
                "lastActivity": "2026-01-01T10:00:00Z",
                "messageCount": 12,
                "status": "pending_hook",
                "pendingHook": {
                    "type": "bash",
                    "toolUseId": "tu-1",
                    "toolName": "Bash",
                    "input": { "command": "ls" }
                }
            }))
            .unwrap();
            assert_eq!(session.status, SessionStatus::PendingHook);
            assert_eq!(session.pending_hook.unwrap().hook_type, HookType::Bash);
            assert!(session.last_message.is_none());
        }

        #[test]
        fn test_session_summary_accepts_working_directory_alias() {
            let session: SessionSummary = serde_json::from_value(json!({
                "id": "s2",
                "projectName": "web",
                "workingDirectory": "/work/web",
                "lastActivity": "2026-01-01T10:00:00Z",
                "status": "idle"
            }))
            .unwrap();
            assert_eq!(session.cwd, "/work/web");
            assert_eq!(session.message_count, 0);
        }

        #[test]
        fn test_unknown_hook_type_is_rejected() {
            let result: Result<HookDescriptor, _> = serde_json::from_value(json!({
                "type": "deploy",
                "toolUseId": "tu-1",
                "toolName": "Deploy"
            }));
            assert!(result.is_err());
        }

        #[test]
        fn test_received_stamps_ingestion_time() {
            let payload: HookAlertPayload = serde_json::from_value(json!({
                "sessionId": "s1",
                "sessionName": "api",
                "hook": { "type": "edit", "toolUseId": "tu-9", "toolName": "Edit", "preview": "src/lib.rs" }
            }))
            .unwrap();
            let at = Utc::now();
            let alert = HookAlert::received(payload, at);
            assert_eq!(alert.received_at, at);
            assert_eq!(alert.hook.preview.as_deref(), Some("src/lib.rs"));
        }
    }
}
