//! Process-wide logging.
//!
//! One `tracing` subscriber is installed at startup and writes to a file in the
//! cache dir, since the terminal belongs to the dashboard. The level can be
//! changed afterwards through [`LogHandle::set_level`]. Components log through a
//! [`Logger`] whose context string is composed from its parents.

use crate::error::OrchestratorError;
use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Context of the root logger
pub const ROOT_CONTEXT: &str = "claude-dash";

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

/// Get the path to the log file
pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|c| c.join("claude-dash").join("claude-dash.log"))
}

/// Build a filter for a level directive such as `info` or `claude_dash=debug`
pub fn level_filter(level: &str) -> Result<EnvFilter, OrchestratorError> {
    EnvFilter::try_new(level).map_err(|e| {
        OrchestratorError::validation(format!("invalid log level '{}': {}", level, e))
            .with_details(serde_json::json!({ "field": "logLevel" }))
    })
}

/// Directive used while verbose logging is toggled on
pub const VERBOSE_LEVEL: &str = "debug";

/// Handle to the installed subscriber
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    base: String,
    verbose: AtomicBool,
    path: PathBuf,
}

impl LogHandle {
    /// Wrap `filter` in a reloadable layer. `filter` becomes the base level
    /// that [`LogHandle::toggle_verbose`] returns to.
    pub fn reloadable(filter: EnvFilter, path: PathBuf) -> (reload::Layer<EnvFilter, Registry>, Self) {
        let base = filter.to_string();
        let (layer, handle) = reload::Layer::new(filter);
        (
            layer,
            Self {
                filter: handle,
                base,
                verbose: AtomicBool::new(false),
                path,
            },
        )
    }

    /// Replace the active level filter
    pub fn set_level(&self, level: &str) -> Result<(), OrchestratorError> {
        let filter = level_filter(level)?;
        self.filter
            .modify(|current| *current = filter)
            .map_err(|e| OrchestratorError::other(e.to_string(), "LOGGING_ERROR"))
    }

    /// The active filter directive
    pub fn level(&self) -> Result<String, OrchestratorError> {
        self.filter
            .with_current(|current| current.to_string())
            .map_err(|e| OrchestratorError::other(e.to_string(), "LOGGING_ERROR"))
    }

    /// Switch between the base level and [`VERBOSE_LEVEL`]. Returns whether
    /// verbose logging is now on.
    pub fn toggle_verbose(&self) -> Result<bool, OrchestratorError> {
        let verbose = !self.verbose.load(Ordering::SeqCst);
        self.set_level(if verbose { VERBOSE_LEVEL } else { self.base.as_str() })?;
        self.verbose.store(verbose, Ordering::SeqCst);
        Ok(verbose)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Install the global subscriber. Later calls return the existing handle.
pub fn init_logging(level: &str, path: PathBuf) -> Result<&'static LogHandle> {
    if let Some(handle) = LOG_HANDLE.get() {
        return Ok(handle);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| level_filter(level))?;
    let (filter_layer, handle) = LogHandle::reloadable(filter, path);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LOG_HANDLE.get_or_init(|| handle))
}

/// The installed handle, if logging was initialized
pub fn log_handle() -> Option<&'static LogHandle> {
    LOG_HANDLE.get()
}

/// Leveled logger carrying a composed context string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    context: String,
}

impl Logger {
    pub fn root() -> Self {
        Self {
            context: ROOT_CONTEXT.to_string(),
        }
    }

    /// Derive a scoped logger, e.g. `claude-dash:connection`
    pub fn child(&self, scope: &str) -> Self {
        Self {
            context: format!("{}:{}", self.context, scope),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!(context = %self.context, "{}", message);
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(context = %self.context, "{}", message);
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(context = %self.context, "{}", message);
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(context = %self.context, "{}", message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_contexts_compose() {
        let log = Logger::root().child("client").child("connection");
        assert_eq!(log.context(), "claude-dash:client:connection");
        assert_eq!(Logger::default().context(), ROOT_CONTEXT);
    }

    #[test]
    fn test_logging_without_subscriber_is_harmless() {
        let log = Logger::root().child("test");
        log.debug("debug");
        log.info(format_args!("{} frames", 3));
        log.warn("warn");
        log.error("error");
    }

    #[test]
    fn test_level_filter_validation() {
        assert!(level_filter("debug").is_ok());
        assert!(level_filter("claude_dash=trace,warn").is_ok());
        let err = level_filter("claude_dash=loud").unwrap_err();
        assert_eq!(err.code(), crate::error::VALIDATION_ERROR);
    }

    mod level_reload {
        use super::*;

        #[test]
        fn test_set_level_swaps_filter() {
            let (_layer, handle) = LogHandle::reloadable(level_filter("info").unwrap(), PathBuf::from("x.log"));
            assert_eq!(handle.level().unwrap(), "info");
            handle.set_level("claude_dash=trace").unwrap();
            assert_eq!(handle.level().unwrap(), "claude_dash=trace");
            assert!(handle.set_level("claude_dash=loud").is_err());
            assert_eq!(handle.level().unwrap(), "claude_dash=trace");
        }

        #[test]
        fn test_toggle_verbose_returns_to_base() {
            let (_layer, handle) = LogHandle::reloadable(level_filter("warn").unwrap(), PathBuf::from("x.log"));
            assert!(handle.toggle_verbose().unwrap());
            assert_eq!(handle.level().unwrap(), VERBOSE_LEVEL);
            assert!(!handle.toggle_verbose().unwrap());
            assert_eq!(handle.level().unwrap(), "warn");
        }

        #[test]
        fn test_dropped_layer_reports_error() {
            let (layer, handle) = LogHandle::reloadable(level_filter("info").unwrap(), PathBuf::from("x.log"));
            drop(layer);
            assert!(handle.set_level("debug").is_err());
            assert!(handle.toggle_verbose().is_err());
        }
    }
}
