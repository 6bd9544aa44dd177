//! Bidirectional byte relay between a local connection and a remote channel
//!
//! A forwarding session owns both ends of its connection pair. The two copy
//! directions are polled together with the shutdown signal; whichever
//! finishes first ends the session, after which both ends are shut down and
//! dropped here, once. Half-closed connections are not kept open.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// How long closing one end may take before it is simply dropped
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Identifying context for one forwarding session, used in logs
#[derive(Debug, Clone)]
pub struct Route {
    /// Per-tunnel connection counter
    pub session_id: u64,
    /// Remote host the channel goes to
    pub remote_host: String,
    /// Socket path on the remote host
    pub remote_socket: String,
    /// Local socket the connection was accepted on
    pub local_path: PathBuf,
}

/// Copy direction within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => write!(f, "local -> remote"),
            Direction::RemoteToLocal => write!(f, "remote -> local"),
        }
    }
}

/// Why a forwarding session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The local client closed its side after `bytes` were relayed upstream
    LocalClosed { bytes: u64 },
    /// The remote channel closed after `bytes` were relayed downstream
    RemoteClosed { bytes: u64 },
    /// Reading or writing failed in one direction
    Failed { direction: Direction, error: io::Error },
    /// The tunnel is shutting down
    Shutdown,
}

/// Relay bytes between `local` and `remote` until one side finishes, an
/// I/O error occurs, or `shutdown` fires.
///
/// Never fails: errors are logged and reported through [`SessionEnd`].
pub async fn forward<L, R>(
    local: L,
    remote: R,
    shutdown: CancellationToken,
    route: &Route,
) -> SessionEnd
where
    L: AsyncRead + AsyncWrite + Send,
    R: AsyncRead + AsyncWrite + Send,
{
    let (mut local_rd, mut local_wr) = tokio::io::split(local);
    let (mut remote_rd, mut remote_wr) = tokio::io::split(remote);

    let end = {
        let upstream = tokio::io::copy(&mut local_rd, &mut remote_wr);
        let downstream = tokio::io::copy(&mut remote_rd, &mut local_wr);

        tokio::select! {
            _ = shutdown.cancelled() => SessionEnd::Shutdown,
            result = upstream => match result {
                Ok(bytes) => SessionEnd::LocalClosed { bytes },
                Err(error) => SessionEnd::Failed {
                    direction: Direction::LocalToRemote,
                    error,
                },
            },
            result = downstream => match result {
                Ok(bytes) => SessionEnd::RemoteClosed { bytes },
                Err(error) => SessionEnd::Failed {
                    direction: Direction::RemoteToLocal,
                    error,
                },
            },
        }
    };

    // Both copies are gone; this is the only place either end gets closed
    close_end(&mut remote_wr, "remote", route).await;
    close_end(&mut local_wr, "local", route).await;
    drop((local_rd, local_wr, remote_rd, remote_wr));

    log_end(&end, route);
    end
}

async fn close_end<W>(writer: &mut W, side: &str, route: &Route)
where
    W: AsyncWrite + Unpin,
{
    match tokio::time::timeout(CLOSE_GRACE, writer.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::trace!(session = route.session_id, "Shutdown of {} end failed: {}", side, e);
        }
        Err(_) => {
            tracing::debug!(session = route.session_id, "Shutdown of {} end timed out", side);
        }
    }
}

fn log_end(end: &SessionEnd, route: &Route) {
    match end {
        SessionEnd::LocalClosed { bytes } => tracing::debug!(
            session = route.session_id,
            "Request from {} to {}:{} done, local client closed after {} bytes",
            route.local_path.display(),
            route.remote_host,
            route.remote_socket,
            bytes
        ),
        SessionEnd::RemoteClosed { bytes } => tracing::debug!(
            session = route.session_id,
            "Request from {} to {}:{} done, remote closed after {} bytes",
            route.local_path.display(),
            route.remote_host,
            route.remote_socket,
            bytes
        ),
        SessionEnd::Failed { direction, error } => tracing::warn!(
            session = route.session_id,
            "Forwarding {} between {} and {}:{} failed: {}",
            direction,
            route.local_path.display(),
            route.remote_host,
            route.remote_socket,
            error
        ),
        SessionEnd::Shutdown => tracing::debug!(
            session = route.session_id,
            "Request from {} to {}:{} closed by tunnel shutdown",
            route.local_path.display(),
            route.remote_host,
            route.remote_socket
        ),
    }
}
