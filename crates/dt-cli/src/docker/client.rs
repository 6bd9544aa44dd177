//! Docker engine client
//!
//! Speaks HTTP/1.1 to the mirrored engine socket with one hyper connection
//! per request.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{header, Request};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::UnixStream;

/// Docker engine API version requested by this client
const API_VERSION: &str = "v1.41";

/// One entry of `GET /containers/json`
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

/// Client for a Docker engine reachable through a local Unix socket
pub struct DockerClient {
    socket_path: PathBuf,
}

impl DockerClient {
    /// Create a client for the engine behind `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Socket this client connects to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// List containers; stopped ones are included when `all` is set
    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let path = format!(
            "/{}/containers/json{}",
            API_VERSION,
            if all { "?all=1" } else { "" }
        );
        let body = self.get(&path).await?;
        serde_json::from_slice(&body).with_context(|| "Failed to parse container list")
    }

    /// Issue a GET request and return the response body of a 2xx reply
    async fn get(&self, path: &str) -> Result<Bytes> {
        tracing::debug!("GET {} via {}", path, self.socket_path.display());

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to {}. Is the tunnel running?",
                    self.socket_path.display()
                )
            })?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .with_context(|| "HTTP handshake with the Docker engine failed")?;

        // Drives the connection until the response has been read
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("Engine connection closed: {}", e);
            }
        });

        let request = Request::get(path)
            .header(header::HOST, "docker")
            .header(
                header::USER_AGENT,
                concat!("docker-tunnel/", env!("CARGO_PKG_VERSION")),
            )
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .with_context(|| format!("Invalid request path {:?}", path))?;

        let response = sender
            .send_request(request)
            .await
            .with_context(|| "Failed to send request")?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .with_context(|| "Failed to read response")?
            .to_bytes();

        if !status.is_success() {
            anyhow::bail!(
                "Docker engine returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body).trim()
            );
        }
        Ok(body)
    }
}
