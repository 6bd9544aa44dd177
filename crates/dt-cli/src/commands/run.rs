//! Run command: keep a tunnel open until the process is told to stop

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use dt_core::config::TunnelConfig;
use dt_tunnel::{SshSession, Tunnel};

use crate::output::{print_info, print_success};

/// Connect over SSH, serve the tunnel, and tear it down on SIGINT/SIGTERM.
///
/// A second signal during teardown exits immediately with status 1.
pub async fn run_command(config: TunnelConfig) -> Result<()> {
    config.validate()?;
    let endpoint = config.endpoint()?;
    let local_path = config.local_socket_path()?;

    let session = SshSession::connect(&config)
        .await
        .with_context(|| format!("Failed to create SSH session to {}", endpoint.host))?;
    let session = Arc::new(session);

    let tunnel = Arc::new(Tunnel::with_endpoint(
        Arc::clone(&session),
        endpoint,
        local_path,
    ));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    let mut running = tokio::spawn({
        let tunnel = Arc::clone(&tunnel);
        async move { tunnel.start().await }
    });

    print_success(&format!(
        "Forwarding {} to {}",
        tunnel.local_path().display(),
        tunnel.endpoint()
    ));
    print_info(&format!(
        "export DOCKER_HOST=unix://{}",
        tunnel.local_path().display()
    ));

    // The tunnel only stops by itself if binding failed
    let finished = tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::info!("Signal received, closing docker tunnel");
            None
        }
        result = &mut running => Some(result),
    };

    let closed = tunnel.close();
    let started = match finished {
        Some(result) => result,
        None => running.await,
    };

    if let Err(e) = session.disconnect().await {
        tracing::debug!("SSH disconnect: {}", e);
    }

    started
        .with_context(|| "Tunnel task panicked")?
        .with_context(|| format!("Tunnel to {} failed", tunnel.endpoint().host))?;
    closed.with_context(|| "Failed to clean up tunnel")?;

    tracing::info!("Docker tunnel shutdown complete");
    Ok(())
}

/// Cancel `shutdown` on the first SIGINT/SIGTERM and exit on the second
fn spawn_signal_handler(shutdown: CancellationToken) -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).with_context(|| "Failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        tracing::warn!("Second signal received, exiting immediately");
        std::process::exit(1);
    });

    Ok(())
}
