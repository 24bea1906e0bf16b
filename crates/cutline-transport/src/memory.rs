//! In-memory transport for simulation and tests
//!
//! Listeners register under an address in a shared hub; connecting creates a
//! `tokio::io::duplex` pipe and hands the far end to the listener. The same framing and
//! handshake code as TCP runs over the pipe.

use crate::{Channel, Listener, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use cutline_core::NodeId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

/// Buffer size of each in-memory pipe direction
const PIPE_CAPACITY: usize = 64 * 1024;

type Registry = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<DuplexStream>>>>;

/// In-memory transport; clones share one address space.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    listeners: Registry,
}

impl MemoryTransport {
    /// Create an empty address space
    pub fn new() -> Self {
        Self::default()
    }

    /// True if something listens at `address`
    pub fn is_listening(&self, address: &str) -> bool {
        self.listeners.lock().contains_key(address)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Listener = MemoryListener;

    async fn listen(&self, local: NodeId, address: &str) -> TransportResult<Self::Listener> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut listeners = self.listeners.lock();
            if listeners.contains_key(address) {
                return Err(TransportError::Bind {
                    address: address.to_string(),
                    source: std::io::ErrorKind::AddrInUse.into(),
                });
            }
            listeners.insert(address.to_string(), tx);
        }
        tracing::debug!(node = %local, address, "memory transport listening");
        Ok(MemoryListener {
            address: address.to_string(),
            incoming: rx,
            registry: self.listeners.clone(),
        })
    }

    async fn connect(
        &self,
        local: NodeId,
        peer: NodeId,
        address: &str,
    ) -> TransportResult<Channel> {
        let listener = self
            .listeners
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable(address.to_string()))?;

        let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
        listener
            .send(far)
            .map_err(|_| TransportError::Unreachable(address.to_string()))?;
        Channel::dial(local, peer, near).await
    }

    fn transport_type(&self) -> &'static str {
        "memory"
    }
}

/// Inbound side of an in-memory address; unregisters itself when dropped.
#[derive(Debug)]
pub struct MemoryListener {
    address: String,
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
    registry: Registry,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&mut self) -> TransportResult<Channel> {
        let stream = self
            .incoming
            .recv()
            .await
            .ok_or_else(|| TransportError::ListenerClosed(self.address.clone()))?;
        Channel::accept(stream).await
    }

    fn local_address(&self) -> String {
        self.address.clone()
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cutline_core::{Message, VectorClock};

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let transport = MemoryTransport::new();
        let mut listener = transport.listen(NodeId(1), "node-1").await.unwrap();

        let mut dialer = transport
            .connect(NodeId(0), NodeId(1), "node-1")
            .await
            .unwrap();
        let mut accepted = listener.accept().await.unwrap();
        assert_eq!(accepted.peer(), NodeId(0));
        assert_eq!(dialer.peer(), NodeId(1));

        let outbound = Message::Application {
            source: NodeId(0),
            clock: VectorClock::from_entries(vec![1, 0]),
        };
        dialer.send(&outbound).await.unwrap();
        assert_eq!(accepted.receive().await.unwrap(), Some(outbound));

        accepted.send(&Message::Marker { source: NodeId(1) }).await.unwrap();
        assert_eq!(
            dialer.receive().await.unwrap(),
            Some(Message::Marker { source: NodeId(1) })
        );
    }

    #[tokio::test]
    async fn test_unknown_address_is_unreachable() {
        let transport = MemoryTransport::new();
        assert_matches!(
            transport.connect(NodeId(0), NodeId(1), "nowhere").await,
            Err(TransportError::Unreachable(_))
        );
    }

    #[tokio::test]
    async fn test_listener_unregisters_on_drop() {
        let transport = MemoryTransport::new();
        let listener = transport.listen(NodeId(0), "node-0").await.unwrap();
        assert!(transport.is_listening("node-0"));
        assert_matches!(
            transport.listen(NodeId(0), "node-0").await,
            Err(TransportError::Bind { .. })
        );
        drop(listener);
        assert!(!transport.is_listening("node-0"));
    }
}
