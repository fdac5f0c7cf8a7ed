//! Live dashboard client for coding-agent sessions.

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod ipc;
pub mod notify;
pub mod tui;
