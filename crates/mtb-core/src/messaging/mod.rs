//! Outbound messaging: the messenger port, throttling and safe delivery.

pub mod delivery;
pub mod port;
pub mod throttled;
pub mod types;
