//! Tunnel engine and the forwarding sessions it launches

mod engine;
mod forward;

pub use engine::Tunnel;
pub use forward::{forward, Direction, Route, SessionEnd};
