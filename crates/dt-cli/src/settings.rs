//! Merge command-line flags into the file configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use dt_core::config::{self, TunnelConfig};

/// Connection flags shared by every subcommand; each one overrides the
/// matching config file value when given
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Remote hostname or IP
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// SSH port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// SSH user to log in to the remote host
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH password
    #[arg(short, long, env = "DOCKER_TUNNEL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSH private key to create the tunnel with
    #[arg(short = 'i', long)]
    pub identity: Option<PathBuf>,

    /// Socket path on the remote host
    #[arg(long)]
    pub remote_socket: Option<String>,

    /// Pinned SSH host key fingerprint (SHA256)
    #[arg(long)]
    pub host_key: Option<String>,

    /// Directory for the local socket
    #[arg(long)]
    pub socket_dir: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Apply the given flags on top of `config`
    pub fn apply(self, config: &mut TunnelConfig) {
        if let Some(host) = self.host {
            config.host = Some(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(identity) = self.identity {
            config.private_key_path = Some(identity);
        }
        if let Some(remote_socket) = self.remote_socket {
            config.remote_socket = remote_socket;
        }
        if let Some(host_key) = self.host_key {
            config.host_key_fingerprint = Some(host_key);
        }
        if let Some(socket_dir) = self.socket_dir {
            config.socket_dir = Some(socket_dir);
        }
    }
}

/// Load the config file, then apply flag overrides.
///
/// An explicit `--config` path must exist. The default path is optional and
/// falls back to defaults when missing or unreadable.
pub fn load_settings(config_path: Option<&Path>, args: ConnectionArgs) -> Result<TunnelConfig> {
    let mut config = match config_path {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                config::load_config(&default_path).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                    TunnelConfig::default()
                })
            } else {
                tracing::debug!("Using default configuration");
                TunnelConfig::default()
            }
        }
    };

    args.apply(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "host = \"from-file\"\nport = 2222\nuser = \"deploy\"\n",
        )
        .unwrap();

        let args = ConnectionArgs {
            host: Some("from-flag".to_string()),
            ..ConnectionArgs::default()
        };
        let config = load_settings(Some(&path), args).unwrap();

        assert_eq!(config.host.as_deref(), Some("from-flag"));
        assert_eq!(config.port, 2222);
        assert_eq!(config.user, "deploy");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(load_settings(Some(&path), ConnectionArgs::default()).is_err());
    }

    #[test]
    fn test_identity_flag_replaces_key() {
        let mut config = TunnelConfig::default();
        ConnectionArgs {
            identity: Some(PathBuf::from("/keys/id_ed25519")),
            password: Some("pw".to_string()),
            ..ConnectionArgs::default()
        }
        .apply(&mut config);

        assert_eq!(
            config.private_key_path,
            Some(PathBuf::from("/keys/id_ed25519"))
        );
        assert_eq!(config.password.as_deref(), Some("pw"));
    }
}
