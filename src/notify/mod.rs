//! Alert lifecycle: the bounded store, sound profiles and desktop notifications.

pub mod desktop;
pub mod settings;
pub mod sound;
pub mod store;
