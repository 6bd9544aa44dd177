//! docker-tunnel: Command-line interface
//!
//! Provides the `docker-tunnel` binary that keeps a tunnel to a remote
//! Docker engine open and talks to the engine through it.

pub mod commands;
pub mod docker;
pub mod output;
pub mod settings;
