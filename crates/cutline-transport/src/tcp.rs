//! TCP transport implementation for one-process-per-node runs

use crate::{Channel, Listener, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use cutline_core::NodeId;
use tokio::net::{TcpListener, TcpStream};

/// TCP transport for production networking
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Listener = TcpChannelListener;

    async fn listen(&self, local: NodeId, address: &str) -> TransportResult<Self::Listener> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Bind {
                address: address.to_string(),
                source,
            })?;
        let bound = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| address.to_string());
        tracing::info!(node = %local, address = %bound, "TCP transport listening");
        Ok(TcpChannelListener { listener, bound })
    }

    async fn connect(
        &self,
        local: NodeId,
        peer: NodeId,
        address: &str,
    ) -> TransportResult<Channel> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        tracing::debug!(node = %local, %peer, address, "TCP connection established");
        Channel::dial(local, peer, stream).await
    }

    fn transport_type(&self) -> &'static str {
        "tcp"
    }
}

/// Accepts TCP connections and performs the node id handshake.
#[derive(Debug)]
pub struct TcpChannelListener {
    listener: TcpListener,
    bound: String,
}

#[async_trait]
impl Listener for TcpChannelListener {
    async fn accept(&mut self) -> TransportResult<Channel> {
        let (stream, remote) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        let channel = Channel::accept(stream).await?;
        tracing::debug!(peer = %channel.peer(), %remote, "accepted TCP connection");
        Ok(channel)
    }

    fn local_address(&self) -> String {
        self.bound.clone()
    }
}
