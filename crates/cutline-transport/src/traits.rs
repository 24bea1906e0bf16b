//! Core transport trait definitions

use crate::{Channel, TransportResult};
use async_trait::async_trait;
use cutline_core::NodeId;

/// Opens channels to neighbors and accepts channels from them.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Listener type returned by [`Transport::listen`]
    type Listener: Listener;

    /// Start accepting connections for `local` at `address`
    async fn listen(&self, local: NodeId, address: &str) -> TransportResult<Self::Listener>;

    /// Dial `peer` at `address`, announcing `local` to the remote side
    async fn connect(&self, local: NodeId, peer: NodeId, address: &str)
        -> TransportResult<Channel>;

    /// Get transport type identifier
    fn transport_type(&self) -> &'static str;
}

/// Stream of inbound channels.
#[async_trait]
pub trait Listener: Send + 'static {
    /// Wait for the next inbound channel; its peer id comes from the handshake
    async fn accept(&mut self) -> TransportResult<Channel>;

    /// Address actually bound (resolves port 0)
    fn local_address(&self) -> String;
}
