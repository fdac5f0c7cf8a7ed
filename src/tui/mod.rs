//! Terminal dashboard.

pub mod app;
pub mod timers;
pub mod ui;
