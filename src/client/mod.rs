//! Event-stream client: connection lifecycle, frame dispatch, subscriptions.

pub mod connection;
pub mod dashboard;
pub mod dispatcher;
pub mod subscriptions;
pub mod transport;
