//! Neighbor channel establishment.
//!
//! Every edge is opened exactly once: the node with the larger id dials, the node with the
//! smaller id accepts. Dialing retries with a fixed delay because peers start independently.
//! Inbound connections from unknown or already connected peers, or with a broken handshake, are
//! dropped and the accept loop keeps waiting.

use crate::NodeError;
use cutline_core::{Config, NodeId};
use cutline_transport::{Channel, Listener, Transport, TransportError};
use std::collections::BTreeSet;
use std::time::Duration;

/// Retry policy for outbound connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Connection attempts per neighbor before giving up
    pub connect_attempts: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            connect_attempts: 50,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Open one channel per neighbor of `id`.
///
/// `listener` must already be bound so that higher-id neighbors can reach this node while it
/// dials the lower-id ones.
pub async fn establish<T: Transport>(
    transport: &T,
    listener: &mut T::Listener,
    id: NodeId,
    config: &Config,
    options: BootstrapOptions,
) -> Result<Vec<Channel>, NodeError> {
    let neighbors = config.neighbors(id);
    let (lower, higher): (Vec<NodeId>, Vec<NodeId>) =
        neighbors.iter().copied().partition(|peer| *peer < id);

    let dial_all = async {
        let mut channels = Vec::with_capacity(lower.len());
        for peer in &lower {
            let address = config
                .node(*peer)
                .map(|node| node.address())
                .ok_or(NodeError::UnknownNode(*peer))?;
            channels.push(dial(transport, id, *peer, &address, options).await?);
        }
        Ok::<_, NodeError>(channels)
    };

    let accept_all = async {
        let mut expected: BTreeSet<NodeId> = higher.iter().copied().collect();
        let mut channels = Vec::with_capacity(expected.len());
        while !expected.is_empty() {
            let channel = match listener.accept().await {
                Ok(channel) => channel,
                Err(TransportError::Handshake(reason)) => {
                    tracing::warn!(node = %id, %reason, "dropping connection with failed handshake");
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            let peer = channel.peer();
            if !expected.remove(&peer) {
                tracing::warn!(node = %id, peer = %peer, "dropping unexpected connection");
                continue;
            }
            tracing::debug!(node = %id, peer = %peer, "accepted neighbor");
            channels.push(channel);
        }
        Ok::<_, NodeError>(channels)
    };

    let (mut channels, accepted) = tokio::try_join!(dial_all, accept_all)?;
    channels.extend(accepted);
    tracing::info!(
        node = %id,
        neighbors = channels.len(),
        transport = transport.transport_type(),
        "neighbor channels established"
    );
    Ok(channels)
}

async fn dial<T: Transport>(
    transport: &T,
    id: NodeId,
    peer: NodeId,
    address: &str,
    options: BootstrapOptions,
) -> Result<Channel, NodeError> {
    let attempts = options.connect_attempts.max(1);
    let mut attempt = 1;
    loop {
        match transport.connect(id, peer, address).await {
            Ok(channel) => {
                tracing::debug!(node = %id, peer = %peer, attempt, "connected to neighbor");
                return Ok(channel);
            }
            Err(error) if attempt < attempts => {
                tracing::debug!(node = %id, peer = %peer, attempt, %error, "neighbor not ready, retrying");
                tokio::time::sleep(options.retry_delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(NodeError::bootstrap(format!(
                    "node {id} could not reach {peer} at {address} after {attempts} attempts: {error}"
                )));
            }
        }
    }
}
