//! Common types and utilities shared by the client, notifications and TUI.

pub mod logging;
pub mod persistence;
pub mod types;
