//! Tunnel configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::socket;
use crate::types::{RemoteEndpoint, DEFAULT_REMOTE_SOCKET};

/// Configuration for one tunnel and the SSH connection carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Remote hostname or IP
    pub host: Option<String>,

    /// SSH port on the remote host
    pub port: u16,

    /// User to log in as
    pub user: String,

    /// Password for password authentication
    pub password: Option<String>,

    /// Private key for public key authentication; `~/` is expanded
    pub private_key_path: Option<PathBuf>,

    /// Pinned host key fingerprint. Any key is accepted when unset.
    pub host_key_fingerprint: Option<String>,

    /// Socket path on the remote host
    pub remote_socket: String,

    /// Directory for the local socket (defaults to `/tmp`)
    pub socket_dir: Option<PathBuf>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 22,
            user: "root".to_string(),
            password: None,
            private_key_path: Some(PathBuf::from("~/.ssh/id_rsa")),
            host_key_fingerprint: None,
            remote_socket: DEFAULT_REMOTE_SOCKET.to_string(),
            socket_dir: None,
        }
    }
}

impl TunnelConfig {
    /// The configured remote host, or an error if none was given
    pub fn require_host(&self) -> Result<&str, ConfigError> {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => Ok(host),
            _ => Err(ConfigError::MissingField("host".to_string())),
        }
    }

    /// `host:port` address to dial
    pub fn ssh_address(&self) -> Result<String, ConfigError> {
        let host = self.require_host()?;
        // Bare IPv6 literals need brackets
        if host.contains(':') && !host.starts_with('[') {
            Ok(format!("[{}]:{}", host, self.port))
        } else {
            Ok(format!("{}:{}", host, self.port))
        }
    }

    /// Remote endpoint this configuration points at
    pub fn endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        Ok(RemoteEndpoint::new(
            self.require_host()?,
            self.remote_socket.clone(),
        ))
    }

    /// Private key path with `~/` expanded
    pub fn resolved_key_path(&self) -> Option<PathBuf> {
        self.private_key_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(super::expand_home)
    }

    /// Local socket path for the configured host
    pub fn local_socket_path(&self) -> Result<PathBuf, ConfigError> {
        let host = self.require_host()?;
        Ok(match &self.socket_dir {
            Some(dir) => socket::resolve_in(dir, host),
            None => socket::resolve(host),
        })
    }

    /// Check that the configuration can produce a working connection
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_host()?;

        if self.password.as_deref().map_or(true, str::is_empty)
            && self.resolved_key_path().is_none()
        {
            return Err(ConfigError::Invalid(
                "at least one of password and private key should be specified".to_string(),
            ));
        }

        if !self.remote_socket.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "remote socket must be an absolute path, got '{}'",
                self.remote_socket
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_flags() {
        let config = TunnelConfig::default();
        assert_eq!(config.port, 22);
        assert_eq!(config.user, "root");
        assert_eq!(config.remote_socket, "/var/run/docker.sock");
        assert_eq!(config.private_key_path, Some(PathBuf::from("~/.ssh/id_rsa")));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TunnelConfig = toml::from_str(
            r#"
            host = "build-01"
            password = "hunter2"
            "#,
        )
        .unwrap();

        assert_eq!(config.host.as_deref(), Some("build-01"));
        assert_eq!(config.port, 22);
        assert_eq!(config.user, "root");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_host() {
        let config = TunnelConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(field)) if field == "host"
        ));
    }

    #[test]
    fn test_requires_some_credential() {
        let config = TunnelConfig {
            host: Some("h1".to_string()),
            private_key_path: None,
            password: None,
            ..TunnelConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_relative_remote_socket() {
        let config = TunnelConfig {
            host: Some("h1".to_string()),
            remote_socket: "docker.sock".to_string(),
            ..TunnelConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_ssh_address() {
        let mut config = TunnelConfig {
            host: Some("h1".to_string()),
            port: 2200,
            ..TunnelConfig::default()
        };
        assert_eq!(config.ssh_address().unwrap(), "h1:2200");

        config.host = Some("fe80::1".to_string());
        assert_eq!(config.ssh_address().unwrap(), "[fe80::1]:2200");
    }

    #[test]
    fn test_local_socket_path_honours_socket_dir() {
        let mut config = TunnelConfig {
            host: Some("h1".to_string()),
            ..TunnelConfig::default()
        };
        assert_eq!(
            config.local_socket_path().unwrap(),
            PathBuf::from("/tmp/h1.docker.sock")
        );

        config.socket_dir = Some(PathBuf::from("/run/user/1000"));
        assert_eq!(
            config.local_socket_path().unwrap(),
            PathBuf::from("/run/user/1000/h1.docker.sock")
        );
    }
}
