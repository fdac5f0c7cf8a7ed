//! Wire format of the dashboard event stream.

pub mod messages;
