//! dt-tunnel: Tunnel engine for docker-tunnel
//!
//! Exposes a socket on a remote host (normally the Docker engine socket) as
//! a local Unix socket. Every local connection gets its own channel over an
//! authenticated SSH session, and bytes are relayed unmodified in both
//! directions until either side closes or the tunnel shuts down.

pub mod transport;
pub mod tunnel;

pub use transport::{SshSession, TransportSession};
pub use tunnel::{SessionEnd, Tunnel};
