//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known path of the Docker engine socket on the remote host
pub const DEFAULT_REMOTE_SOCKET: &str = "/var/run/docker.sock";

/// The remote side of a tunnel: a host plus the socket path on that host.
///
/// Immutable once a tunnel is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Remote host identifier (hostname or IP), as given by the user
    pub host: String,
    /// Socket path on the remote host
    pub socket_path: String,
}

impl RemoteEndpoint {
    /// Create an endpoint for an arbitrary remote socket
    pub fn new(host: impl Into<String>, socket_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            socket_path: socket_path.into(),
        }
    }

    /// Endpoint for the Docker engine socket on `host`
    pub fn docker(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_REMOTE_SOCKET)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.socket_path)
    }
}

/// Lifecycle state of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Constructed, nothing bound yet
    Created,
    /// Local socket bound, accept loop running
    Running,
    /// Shutdown signalled; terminal
    Closed,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Created => write!(f, "created"),
            TunnelState::Running => write!(f, "running"),
            TunnelState::Closed => write!(f, "closed"),
        }
    }
}
