//! Container listing through a running tunnel

use anyhow::{Context, Result};

use dt_core::config::TunnelConfig;

use crate::docker::DockerClient;
use crate::output::format_containers;

/// List containers on the remote engine via the tunnel's local socket
pub async fn ps_command(config: &TunnelConfig, all: bool) -> Result<()> {
    let client = DockerClient::new(config.local_socket_path()?);

    let containers = client
        .list_containers(all)
        .await
        .with_context(|| "Failed to list containers")?;

    println!("{}", format_containers(&containers));
    Ok(())
}
