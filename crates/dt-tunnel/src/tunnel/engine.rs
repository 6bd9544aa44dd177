//! Tunnel engine
//!
//! Owns the local listening socket, accepts client connections and pairs
//! each one with a fresh channel to the remote socket.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use dt_core::socket::{self, SocketProbe};
use dt_core::{RemoteEndpoint, TunnelError, TunnelState};

use super::forward::{forward, Route};
use crate::transport::TransportSession;

/// Pause after a failed `accept` so a persistent error cannot spin the loop
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Lifecycle bookkeeping guarded by one lock
struct Lifecycle {
    state: TunnelState,
    /// Whether this instance created the socket file
    bound: bool,
}

/// Mirrors one remote socket as a local Unix socket.
///
/// Lifecycle: `Created` → [`start`](Self::start) → `Running` →
/// [`close`](Self::close) → `Closed`. `start` runs the accept loop and only
/// returns once the tunnel is shut down, so it is usually spawned on its own
/// task while the owner keeps an `Arc` to call `close` with.
pub struct Tunnel<S: TransportSession> {
    /// Transport used to open one channel per local connection
    session: Arc<S>,
    /// Remote host and socket
    endpoint: RemoteEndpoint,
    /// Local socket path
    local_path: PathBuf,
    lifecycle: Mutex<Lifecycle>,
    /// Fired once by `close`; observed by the accept loop and every session
    shutdown: CancellationToken,
    /// In-flight forwarding sessions
    sessions: TaskTracker,
    next_session_id: AtomicU64,
}

impl<S: TransportSession> Tunnel<S> {
    /// Tunnel to the Docker socket on `remote_host`, mirrored at the
    /// resolved local path. Performs no I/O.
    pub fn new(session: Arc<S>, remote_host: impl Into<String>) -> Self {
        let endpoint = RemoteEndpoint::docker(remote_host);
        let local_path = socket::resolve(&endpoint.host);
        Self::with_endpoint(session, endpoint, local_path)
    }

    /// Tunnel to an explicit remote endpoint and local path. Performs no I/O.
    pub fn with_endpoint(session: Arc<S>, endpoint: RemoteEndpoint, local_path: PathBuf) -> Self {
        Self {
            session,
            endpoint,
            local_path,
            lifecycle: Mutex::new(Lifecycle {
                state: TunnelState::Created,
                bound: false,
            }),
            shutdown: CancellationToken::new(),
            sessions: TaskTracker::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Local socket path clients connect to
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Remote endpoint every channel is opened to
    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> TunnelState {
        self.lifecycle().state
    }

    /// Number of forwarding sessions still running
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Handle on the shutdown signal; cancelling it stops the tunnel without
    /// removing the socket file
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the local socket and serve connections until shutdown.
    ///
    /// Returns an error only if the socket cannot be bound. After shutdown
    /// it waits for in-flight sessions, which close themselves on the same
    /// signal, before returning.
    pub async fn start(&self) -> Result<(), TunnelError> {
        let listener = self.bind()?;

        tracing::info!(
            "Docker tunnel to {}:{} started at {}",
            self.endpoint.host,
            self.endpoint.socket_path,
            self.local_path.display()
        );

        self.accept_loop(listener).await;

        self.sessions.close();
        self.sessions.wait().await;

        tracing::info!("Docker tunnel to {} stopped", self.endpoint.host);
        Ok(())
    }

    /// Signal shutdown and remove the socket file.
    ///
    /// Safe to call more than once and before `start`; only the first call
    /// fires the signal. The file is only removed if this tunnel bound it,
    /// and a missing file is not an error.
    pub fn close(&self) -> Result<(), TunnelError> {
        let bound = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state == TunnelState::Closed {
                tracing::debug!("Tunnel to {} already closed", self.endpoint.host);
            } else {
                tracing::info!(
                    "Closing docker tunnel to {} at {}",
                    self.endpoint.host,
                    self.local_path.display()
                );
                lifecycle.state = TunnelState::Closed;
                self.shutdown.cancel();
            }
            lifecycle.bound
        };

        if !bound {
            return Ok(());
        }

        match socket::remove_socket_file(&self.local_path) {
            Ok(true) => {
                tracing::debug!("Removed {}", self.local_path.display());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(source) => Err(TunnelError::Remove {
                path: self.local_path.clone(),
                source,
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        // The guarded data stays consistent even if a holder panicked
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Transition `Created` → `Running` and bind the listener atomically with
    /// respect to `close`
    fn bind(&self) -> Result<UnixListener, TunnelError> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            TunnelState::Created => {}
            TunnelState::Running => return Err(TunnelError::AlreadyStarted),
            TunnelState::Closed => return Err(TunnelError::Closed),
        }

        let path = &self.local_path;
        // A live peer tunnel serves the liveness check as one short-lived client
        match socket::probe_socket(path) {
            SocketProbe::Absent => {}
            SocketProbe::Live => {
                return Err(TunnelError::AddrInUse { path: path.clone() });
            }
            SocketProbe::Stale => {
                tracing::warn!("Removing stale socket {}", path.display());
                socket::remove_socket_file(path).map_err(|source| TunnelError::Remove {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TunnelError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(path).map_err(|source| TunnelError::Bind {
            path: path.clone(),
            source,
        })?;

        lifecycle.state = TunnelState::Running;
        lifecycle.bound = true;
        Ok(listener)
    }

    async fn accept_loop(&self, listener: UnixListener) {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Accept loop on {} shutting down", self.local_path.display());
                    break;
                }

                result = listener.accept() => match result {
                    Ok((stream, _)) => self.spawn_session(stream),
                    Err(e) => {
                        tracing::warn!(
                            "Failed to accept local connection on {}: {}",
                            self.local_path.display(),
                            e
                        );
                        tokio::select! {
                            _ = self.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_ERROR_PAUSE) => {}
                        }
                    }
                }
            }
        }
    }

    fn spawn_session(&self, local: UnixStream) {
        let route = Route {
            session_id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            remote_host: self.endpoint.host.clone(),
            remote_socket: self.endpoint.socket_path.clone(),
            local_path: self.local_path.clone(),
        };
        tracing::debug!(
            session = route.session_id,
            "Accepted a docker request on {}",
            route.local_path.display()
        );

        let session = Arc::clone(&self.session);
        let shutdown = self.shutdown.clone();

        self.sessions.spawn(async move {
            let opened = tokio::select! {
                _ = shutdown.cancelled() => return,
                result = session.open_channel(&route.remote_socket) => result,
            };

            let remote = match opened {
                Ok(remote) => remote,
                Err(e) => {
                    // Dropping `local` closes the client connection
                    tracing::warn!(
                        session = route.session_id,
                        "Failed to dial {}:{}: {}",
                        route.remote_host,
                        route.remote_socket,
                        e
                    );
                    return;
                }
            };

            tracing::debug!(
                session = route.session_id,
                "Forwarding request to {}:{}",
                route.remote_host,
                route.remote_socket
            );
            forward(local, remote, shutdown, &route).await;
        });
    }
}

// The accept-error branch is not exercised here: a bound tokio
// `UnixListener` only fails `accept` on resource exhaustion (EMFILE/ENFILE)
// or kernel errors, which cannot be provoked per-test without changing
// process-wide fd limits. The pause itself races the shutdown token the
// same way the accept branch does, which the shutdown tests cover.
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dt_core::TransportError;
    use tokio::io::DuplexStream;

    /// Transport that never manages to open a channel
    struct Unreachable;

    #[async_trait]
    impl TransportSession for Unreachable {
        type Channel = DuplexStream;

        async fn open_channel(&self, remote_socket: &str) -> Result<DuplexStream, TransportError> {
            Err(TransportError::ChannelOpen {
                remote: remote_socket.to_string(),
                message: "unreachable".to_string(),
            })
        }
    }

    fn tunnel_in(dir: &Path) -> Arc<Tunnel<Unreachable>> {
        let endpoint = RemoteEndpoint::docker("h1");
        let path = socket::resolve_in(dir, &endpoint.host);
        Arc::new(Tunnel::with_endpoint(Arc::new(Unreachable), endpoint, path))
    }

    async fn wait_for_socket(path: &Path) {
        for _ in 0..100 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("socket {} never appeared", path.display());
    }

    #[test]
    fn test_new_performs_no_io() {
        let tunnel = Tunnel::new(Arc::new(Unreachable), "h1");
        assert_eq!(tunnel.state(), TunnelState::Created);
        assert_eq!(tunnel.local_path(), Path::new("/tmp/h1.docker.sock"));
        assert_eq!(tunnel.endpoint().socket_path, "/var/run/docker.sock");
        assert_eq!(tunnel.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_close_before_start_then_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tunnel = tunnel_in(dir.path());

        tunnel.close().unwrap();
        assert_eq!(tunnel.state(), TunnelState::Closed);
        assert!(matches!(tunnel.start().await, Err(TunnelError::Closed)));
        assert!(!tunnel.local_path().exists());
    }

    #[tokio::test]
    async fn test_close_before_start_leaves_foreign_socket() {
        let dir = tempfile::tempdir().unwrap();
        let tunnel = tunnel_in(dir.path());
        std::fs::write(tunnel.local_path(), b"").unwrap();

        tunnel.close().unwrap();
        assert!(tunnel.local_path().exists());
    }

    #[tokio::test]
    async fn test_second_start_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let tunnel = tunnel_in(dir.path());

        let running = tokio::spawn({
            let tunnel = Arc::clone(&tunnel);
            async move { tunnel.start().await }
        });
        wait_for_socket(tunnel.local_path()).await;

        assert!(matches!(
            tunnel.start().await,
            Err(TunnelError::AlreadyStarted)
        ));
        assert_eq!(tunnel.state(), TunnelState::Running);

        tunnel.close().unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_token_stops_accept_loop() {
        let dir = tempfile::tempdir().unwrap();
        let tunnel = tunnel_in(dir.path());

        let running = tokio::spawn({
            let tunnel = Arc::clone(&tunnel);
            async move { tunnel.start().await }
        });
        wait_for_socket(tunnel.local_path()).await;

        tunnel.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("start did not return after shutdown")
            .unwrap()
            .unwrap();

        // The signal alone leaves the file; close removes it
        assert!(tunnel.local_path().exists());
        tunnel.close().unwrap();
        assert!(!tunnel.local_path().exists());
    }
}
