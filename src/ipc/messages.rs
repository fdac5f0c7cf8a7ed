//! Frames exchanged with the dashboard server over the event stream.
//!
//! Inbound frames are JSON objects of the shape
//! `{ "type": <kind>, "data": <payload>, "sessionId"?: <string> }`.
//! Outbound frames are subscription control messages.

use crate::common::types::{DashboardStats, HookAlertPayload, SessionSummary};
use crate::error::{require_string, OrchestratorError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame kinds understood by the dispatcher
pub const INIT: &str = "init";
pub const SESSIONS_UPDATE: &str = "sessionsUpdate";
pub const HOOK_ALERT: &str = "hookAlert";
pub const WEB_SESSION: &str = "webSession";

/// Envelope shared by every inbound frame
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default, rename = "sessionId")]
    session_id: Option<Value>,
    /// Optional aggregate stats riding along with a `sessionsUpdate`
    #[serde(default)]
    stats: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct InitPayload {
    sessions: Vec<SessionSummary>,
    stats: DashboardStats,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Full state after a connection opens
    Init {
        sessions: Vec<SessionSummary>,
        stats: DashboardStats,
    },
    /// Replacement session collection
    SessionsUpdate {
        sessions: Vec<SessionSummary>,
        stats: Option<DashboardStats>,
    },
    /// A hook needs the user's attention
    HookAlert(HookAlertPayload),
    /// Opaque live output for one session
    WebSession { session_id: String, message: Value },
    /// A frame kind this client does not know about
    Unknown(String),
}

/// Per-frame decode failure. Never fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {kind} frame: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: OrchestratorError,
    },
}

impl ServerFrame {
    /// Parse one raw text frame
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(FrameError::Malformed)?;

        match envelope.kind.as_str() {
            INIT => {
                let payload: InitPayload = payload(INIT, envelope.data)?;
                Ok(ServerFrame::Init {
                    sessions: payload.sessions,
                    stats: payload.stats,
                })
            }
            SESSIONS_UPDATE => {
                let sessions = payload(SESSIONS_UPDATE, envelope.data)?;
                let stats = match envelope.stats {
                    Some(Value::Null) | None => None,
                    Some(value) => Some(payload(SESSIONS_UPDATE, value)?),
                };
                Ok(ServerFrame::SessionsUpdate { sessions, stats })
            }
            HOOK_ALERT => Ok(ServerFrame::HookAlert(payload(HOOK_ALERT, envelope.data)?)),
            WEB_SESSION => {
                let session_id = require_string(envelope.session_id.as_ref(), "sessionId")
                    .map_err(|source| FrameError::Invalid {
                        kind: WEB_SESSION,
                        source,
                    })?
                    .to_string();
                Ok(ServerFrame::WebSession {
                    session_id,
                    message: envelope.data,
                })
            }
            _ => Ok(ServerFrame::Unknown(envelope.kind)),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, FrameError> {
    serde_json::from_value(value).map_err(|source| FrameError::Payload { kind, source })
}

/// Control frames sent from the client to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    SubscribeWebSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    UnsubscribeWebSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::HookType;
    use serde_json::json;

    fn session_json(id: &str) -> Value {
        json!({
            "id": id,
            "projectName": "proj",
            "cwd": "/tmp/proj",
            "lastActivity": "2026-01-01T00:00:00Z",
            "messageCount": 3,
            "status": "active"
        })
    }

    #[test]
    fn test_decode_init() {
        let raw = json!({
            "type": "init",
            "data": {
                "sessions": [session_json("a"), session_json("b")],
                "stats": { "totalSessions": 2, "activeSessions": 2, "pendingHooks": 0, "projectCount": 1 }
            }
        })
        .to_string();
        match ServerFrame::decode(&raw).unwrap() {
            ServerFrame::Init { sessions, stats } => {
                assert_eq!(sessions.len(), 2);
                assert_eq!(sessions[0].id, "a");
                assert_eq!(stats.total_sessions, 2);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_sessions_update_with_and_without_stats() {
        let raw = json!({ "type": "sessionsUpdate", "data": [session_json("a")] }).to_string();
        assert!(matches!(
            ServerFrame::decode(&raw).unwrap(),
            ServerFrame::SessionsUpdate { stats: None, .. }
        ));

        let raw = json!({
            "type": "sessionsUpdate",
            "data": [],
            "stats": { "totalSessions": 0, "activeSessions": 0, "pendingHooks": 0, "projectCount": 0 }
        })
        .to_string();
        assert!(matches!(
            ServerFrame::decode(&raw).unwrap(),
            ServerFrame::SessionsUpdate { stats: Some(_), .. }
        ));
    }

    #[test]
    fn test_decode_hook_alert() {
        let raw = json!({
            "type": "hookAlert",
            "data": {
                "sessionId": "s1",
                "sessionName": "api",
                "hook": { "type": "question", "toolUseId": "tu-1", "toolName": "AskUserQuestion", "input": {} }
            }
        })
        .to_string();
        match ServerFrame::decode(&raw).unwrap() {
            ServerFrame::HookAlert(payload) => assert_eq!(payload.hook.hook_type, HookType::Question),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_web_session_requires_session_id() {
        let raw = json!({ "type": "webSession", "sessionId": "s1", "data": { "text": "hi" } }).to_string();
        assert_eq!(
            ServerFrame::decode(&raw).unwrap(),
            ServerFrame::WebSession {
                session_id: "s1".into(),
                message: json!({ "text": "hi" })
            }
        );

        let raw = json!({ "type": "webSession", "data": {} }).to_string();
        assert!(matches!(ServerFrame::decode(&raw), Err(FrameError::Invalid { .. })));

        let raw = json!({ "type": "webSession", "sessionId": "", "data": {} }).to_string();
        assert!(matches!(ServerFrame::decode(&raw), Err(FrameError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_kind_is_not_an_error() {
        let raw = json!({ "type": "serverRestarting", "data": 1 }).to_string();
        assert_eq!(
            ServerFrame::decode(&raw).unwrap(),
            ServerFrame::Unknown("serverRestarting".into())
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(ServerFrame::decode("not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(ServerFrame::decode("{\"data\": 1}"), Err(FrameError::Malformed(_))));
        let raw = json!({ "type": "init", "data": { "sessions": "nope" } }).to_string();
        assert!(matches!(ServerFrame::decode(&raw), Err(FrameError::Payload { kind: INIT, .. })));
    }

    #[test]
    fn test_client_frame_wire_shape() {
        let frame = ClientFrame::SubscribeWebSession { session_id: "s1".into() };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "type": "subscribeWebSession", "sessionId": "s1" })
        );
        let frame = ClientFrame::UnsubscribeWebSession { session_id: "s1".into() };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "type": "unsubscribeWebSession", "sessionId": "s1" })
        );
    }
}
