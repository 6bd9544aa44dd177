//! Socket path command implementation

use anyhow::Result;

use dt_core::config::TunnelConfig;

/// Print the local socket path the tunnel for the configured host uses
pub fn socket_path_command(config: &TunnelConfig) -> Result<()> {
    let path = config.local_socket_path()?;
    println!("{}", path.display());
    Ok(())
}
