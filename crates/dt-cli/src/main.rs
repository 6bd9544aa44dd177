//! docker-tunnel CLI
//!
//! Exposes the Docker engine socket of a remote host as a local Unix
//! socket over SSH:
//! - `run` keeps the tunnel open until interrupted
//! - `ps` lists containers through a running tunnel
//! - `socket-path` prints where the local socket lives

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docker_tunnel::commands;
use docker_tunnel::settings::{load_settings, ConnectionArgs};

#[derive(Parser)]
#[command(name = "docker-tunnel")]
#[command(author, version, about = "Expose a remote Docker engine socket locally over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the tunnel and keep it running until interrupted
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// List containers on the remote engine through a running tunnel
    Ps {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// Show all containers (default shows just running)
        #[arg(short, long)]
        all: bool,
    },

    /// Print the local socket path used for a host
    SocketPath {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Run { connection } => {
            let config = load_settings(cli.config.as_deref(), connection)?;
            commands::run_command(config).await
        }
        Commands::Ps { connection, all } => {
            let config = load_settings(cli.config.as_deref(), connection)?;
            commands::ps_command(&config, all).await
        }
        Commands::SocketPath { connection } => {
            let config = load_settings(cli.config.as_deref(), connection)?;
            commands::socket_path_command(&config)
        }
    }
}
