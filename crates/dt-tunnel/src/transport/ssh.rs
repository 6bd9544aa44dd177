//! SSH transport session
//!
//! Dials the remote host, authenticates, and opens `direct-streamlocal`
//! channels to sockets on the remote side.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::Disconnect;
use russh_keys::key::PublicKey;

use dt_core::config::TunnelConfig;
use dt_core::TransportError;

use super::{ChannelIo, TransportSession};

/// Upper bound for dialing and completing the SSH handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed stream handed out for every opened channel
pub type BoxedChannel = Box<dyn ChannelIo>;

/// An authenticated SSH connection to the remote host
pub struct SshSession {
    /// `host:port` this session is connected to
    address: String,
    /// russh client handle
    handle: Handle<ClientHandler>,
}

impl SshSession {
    /// Connect and authenticate using `config`.
    ///
    /// Public key authentication is tried first when a key is configured,
    /// then the password.
    pub async fn connect(config: &TunnelConfig) -> Result<Self, TransportError> {
        let address = config
            .ssh_address()
            .map_err(|e| TransportError::Connect {
                address: String::new(),
                message: e.to_string(),
            })?;

        let seen_key = Arc::new(Mutex::new(None));
        let handler = ClientHandler {
            expected_fingerprint: config.host_key_fingerprint.clone(),
            seen_fingerprint: Arc::clone(&seen_key),
        };

        tracing::debug!("Connecting to {}", address);
        let mut handle = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client::connect(Arc::new(Config::default()), address.as_str(), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(CONNECT_TIMEOUT))?
        .map_err(|e| match e {
            russh::Error::UnknownKey => TransportError::HostKeyRejected {
                expected: config.host_key_fingerprint.clone().unwrap_or_default(),
                actual: seen_key
                    .lock()
                    .ok()
                    .and_then(|seen| seen.clone())
                    .unwrap_or_else(|| "<none>".to_string()),
            },
            other => TransportError::Connect {
                address: address.clone(),
                message: other.to_string(),
            },
        })?;

        let authenticated = authenticate(&mut handle, config).await?;
        if !authenticated {
            return Err(TransportError::AuthRejected {
                user: config.user.clone(),
            });
        }

        tracing::info!("SSH session to {} established as '{}'", address, config.user);
        Ok(Self { address, handle })
    }

    /// Address this session is connected to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Disconnect the SSH session
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "tunnel closed", "en")
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))
    }
}

#[async_trait]
impl TransportSession for SshSession {
    type Channel = BoxedChannel;

    async fn open_channel(&self, remote_socket: &str) -> Result<Self::Channel, TransportError> {
        let channel = self
            .handle
            .channel_open_direct_streamlocal(remote_socket)
            .await
            .map_err(|e| TransportError::ChannelOpen {
                remote: format!("{}:{}", self.address, remote_socket),
                message: e.to_string(),
            })?;

        Ok(Box::new(channel.into_stream()))
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    config: &TunnelConfig,
) -> Result<bool, TransportError> {
    let mut key_error = None;

    if let Some(key_path) = config.resolved_key_path() {
        match load_key(&key_path) {
            Ok(key) => {
                tracing::debug!("Authenticating as '{}' with {}", config.user, key_path.display());
                let accepted = handle
                    .authenticate_publickey(&config.user, Arc::new(key))
                    .await
                    .map_err(|e| TransportError::Connect {
                        address: config.ssh_address().unwrap_or_default(),
                        message: format!("public key authentication error: {}", e),
                    })?;
                if accepted {
                    return Ok(true);
                }
                tracing::debug!("Public key rejected for '{}'", config.user);
            }
            Err(e) => {
                tracing::debug!("Skipping public key authentication: {}", e);
                key_error = Some(e);
            }
        }
    }

    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        tracing::debug!("Authenticating as '{}' with password", config.user);
        return handle
            .authenticate_password(&config.user, password)
            .await
            .map_err(|e| TransportError::Connect {
                address: config.ssh_address().unwrap_or_default(),
                message: format!("password authentication error: {}", e),
            });
    }

    // Surface the unreadable key when it was the only credential
    match key_error {
        Some(e) => Err(e),
        None => Ok(false),
    }
}

fn load_key(path: &Path) -> Result<russh_keys::key::KeyPair, TransportError> {
    if !path.exists() {
        return Err(TransportError::KeyNotFound {
            path: path.to_path_buf(),
            message: "file does not exist".to_string(),
        });
    }

    russh_keys::load_secret_key(path, None).map_err(|e| TransportError::KeyNotFound {
        path: path.to_path_buf(),
        message: format!("failed to load key: {}", e),
    })
}

/// russh client handler; only host key policy lives here
struct ClientHandler {
    /// Pinned fingerprint, if any
    expected_fingerprint: Option<String>,
    /// Fingerprint presented by the server, kept for error reporting
    seen_fingerprint: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    /// Accept any host key unless a fingerprint is pinned
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        if let Ok(mut seen) = self.seen_fingerprint.lock() {
            *seen = Some(fingerprint.clone());
        }

        match &self.expected_fingerprint {
            Some(expected) if !fingerprint_matches(expected, &fingerprint) => {
                tracing::error!(
                    "Host key mismatch: expected {}, got {}",
                    expected,
                    fingerprint
                );
                Ok(false)
            }
            Some(_) => {
                tracing::debug!("Host key verified against pinned fingerprint");
                Ok(true)
            }
            None => {
                tracing::info!("Accepting server host key {}", fingerprint);
                Ok(true)
            }
        }
    }
}

/// Compare fingerprints, tolerating an OpenSSH-style `SHA256:` prefix
fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    let strip = |s: &str| s.trim().trim_start_matches("SHA256:").to_string();
    strip(expected) == strip(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_matches_with_prefix() {
        assert!(fingerprint_matches("SHA256:abc123", "abc123"));
        assert!(fingerprint_matches("abc123", "abc123"));
        assert!(!fingerprint_matches("SHA256:abc123", "abc124"));
    }

    #[test]
    fn test_load_key_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_missing");
        assert!(matches!(
            load_key(&path),
            Err(TransportError::KeyNotFound { path: p, .. }) if p == path
        ));
    }

    #[test]
    fn test_load_key_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_garbage");
        std::fs::write(&path, "not a key").unwrap();
        assert!(matches!(
            load_key(&path),
            Err(TransportError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let config = TunnelConfig {
            host: Some("127.0.0.1".to_string()),
            port,
            password: Some("secret".to_string()),
            ..TunnelConfig::default()
        };

        let result = SshSession::connect(&config).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
