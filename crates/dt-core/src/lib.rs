//! dt-core: Core abstractions and configuration for docker-tunnel
//!
//! This crate provides the shared types, error taxonomy, configuration and
//! local socket path handling used by the tunnel engine and the CLI.

pub mod config;
pub mod error;
pub mod socket;
pub mod types;

pub use error::{ConfigError, TransportError, TunnelError};
pub use types::{RemoteEndpoint, TunnelState, DEFAULT_REMOTE_SOCKET};
