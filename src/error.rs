//! Typed failures with machine-readable codes, validation helpers, and
//! response formatting.
//!
//! Every variant fixes its code and HTTP status. Callers choose the message
//! and optional structured details, never the code or status (the catch-all
//! [`OrchestratorError::Other`] is the one variant that carries an explicit
//! code, and its status is still fixed at 500).

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Requested resource does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Caller input is malformed.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Operation is not valid for the session's lifecycle state.
pub const SESSION_ERROR: &str = "SESSION_ERROR";
/// Underlying storage or IO failure.
pub const FILESYSTEM_ERROR: &str = "FILESYSTEM_ERROR";
/// Default code for the catch-all variant.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Environment variable that selects the runtime mode.
pub const RUNTIME_MODE_ENV: &str = "CLAUDE_DASH_ENV";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Session {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    FileSystem {
        message: String,
        details: Option<Value>,
    },

    /// Catch-all with an explicit machine code.
    #[error("{message}")]
    Other {
        message: String,
        code: String,
        details: Option<Value>,
    },
}

impl OrchestratorError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
            details: None,
        }
    }

    pub fn file_system(message: impl Into<String>) -> Self {
        Self::FileSystem {
            message: message.into(),
            details: None,
        }
    }

    pub fn other(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Attach structured details, replacing any existing payload.
    pub fn with_details(mut self, value: Value) -> Self {
        match &mut self {
            Self::NotFound { details, .. }
            | Self::Validation { details, .. }
            | Self::Session { details, .. }
            | Self::FileSystem { details, .. }
            | Self::Other { details, .. } => *details = Some(value),
        }
        self
    }

    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound { .. } => NOT_FOUND,
            Self::Validation { .. } => VALIDATION_ERROR,
            Self::Session { .. } => SESSION_ERROR,
            Self::FileSystem { .. } => FILESYSTEM_ERROR,
            Self::Other { code, .. } => code,
        }
    }

    /// HTTP status for this variant.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } | Self::Session { .. } => 400,
            Self::FileSystem { .. } | Self::Other { .. } => 500,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::NotFound { details, .. }
            | Self::Validation { details, .. }
            | Self::Session { details, .. }
            | Self::FileSystem { details, .. }
            | Self::Other { details, .. } => details.as_ref(),
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        Self::file_system(err.to_string()).with_details(json!({ "kind": err.kind().to_string() }))
    }
}

fn invalid_field(field: &str, expectation: &str) -> OrchestratorError {
    OrchestratorError::validation(format!("{} must be {}", field, expectation))
        .with_details(json!({ "field": field }))
}

/// Require a non-empty string. `None` stands for an absent field.
pub fn require_string<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a str, OrchestratorError> {
    match value.and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(invalid_field(field, "a non-empty string")),
    }
}

/// Require a literal boolean; `"true"` and `1` are rejected.
pub fn require_boolean(value: Option<&Value>, field: &str) -> Result<bool, OrchestratorError> {
    value
        .and_then(Value::as_bool)
        .ok_or_else(|| invalid_field(field, "a boolean"))
}

/// Require a plain object; null, arrays and primitives are rejected.
pub fn require_object<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, OrchestratorError> {
    value
        .and_then(Value::as_object)
        .ok_or_else(|| invalid_field(field, "an object"))
}

/// Runtime mode controls whether error details leave the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    pub fn from_env() -> Self {
        std::env::var(RUNTIME_MODE_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }
}

/// Wire shape of a formatted error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Render an error for a response body. Details are withheld in production.
pub fn format_error_response(err: &OrchestratorError, mode: RuntimeMode) -> ErrorResponse {
    ErrorResponse {
        error: err.to_string(),
        code: err.code().to_string(),
        details: match mode {
            RuntimeMode::Production => None,
            RuntimeMode::Development => err.details().cloned(),
        },
    }
}

/// Format an arbitrary error chain, preserving taxonomy errors when present.
pub fn format_any_error(err: &anyhow::Error, mode: RuntimeMode) -> ErrorResponse {
    match err.downcast_ref::<OrchestratorError>() {
        Some(known) => format_error_response(known, mode),
        None => ErrorResponse {
            error: format!("{:#}", err),
            code: INTERNAL_ERROR.to_string(),
            details: None,
        },
    }
}
