//! Core error types for docker-tunnel

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Engine-level errors returned by the tunnel lifecycle operations.
///
/// Per-connection failures never show up here; they are logged and the
/// affected connection is dropped.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Another live listener already owns the local socket path
    #[error("Local socket {} is already served by a live listener", path.display())]
    AddrInUse { path: PathBuf },

    /// Binding the local socket failed
    #[error("Failed to bind local socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing the local socket file failed
    #[error("Failed to remove local socket {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called on a tunnel that already started
    #[error("Tunnel already started")]
    AlreadyStarted,

    /// `start` was called after `close`
    #[error("Tunnel is closed")]
    Closed,
}

/// Errors raised while establishing or using the encrypted transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connect timeout elapsed before the handshake completed
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Dialing or handshaking with the remote host failed
    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    /// Private key could not be read or parsed
    #[error("Private key not usable at {}: {message}", path.display())]
    KeyNotFound { path: PathBuf, message: String },

    /// Every configured authentication method was rejected
    #[error("Authentication rejected for user '{user}'")]
    AuthRejected { user: String },

    /// Server host key did not match the pinned fingerprint
    #[error("Host key verification failed: expected {expected}, got {actual}")]
    HostKeyRejected { expected: String, actual: String },

    /// Opening a logical channel to the remote socket failed
    #[error("Failed to open channel to {remote}: {message}")]
    ChannelOpen { remote: String, message: String },

    /// Disconnecting the transport failed
    #[error("Disconnect failed: {0}")]
    Disconnect(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_error_mentions_path() {
        let err = TunnelError::AddrInUse {
            path: PathBuf::from("/tmp/h1.docker.sock"),
        };
        assert!(err.to_string().contains("/tmp/h1.docker.sock"));
    }
}
