//! Transport sessions that can open logical channels to remote sockets

mod ssh;

pub use ssh::{BoxedChannel, SshSession, CONNECT_TIMEOUT};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use dt_core::TransportError;

/// Duplex byte stream carried by a transport channel
pub trait ChannelIo: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> ChannelIo for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// An established, authenticated transport to a remote host.
///
/// The tunnel engine only ever asks it for new channels; connection setup,
/// authentication and host key policy live with the implementation.
#[async_trait]
pub trait TransportSession: Send + Sync + 'static {
    /// Stream type of an opened channel
    type Channel: ChannelIo;

    /// Open a new logical channel to `remote_socket` on the remote host
    async fn open_channel(&self, remote_socket: &str) -> Result<Self::Channel, TransportError>;
}
