//! A node that receives a message breaking the channel contract shuts down with the violation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_matches::assert_matches;
use cutline_core::{Config, Message, NodeConfig, NodeId, ProtocolViolation, RunParameters};
use cutline_node::{Node, NodeError};
use cutline_transport::{Listener, MemoryTransport, Transport};
use std::sync::Arc;
use std::time::Duration;

fn pair() -> Arc<Config> {
    let params = RunParameters::new(
        2,
        1,
        2,
        Duration::from_millis(1),
        Duration::from_secs(60),
        4,
    );
    let mut zero = NodeConfig::new(NodeId(0), "mem", 9500);
    zero.neighbors.insert(NodeId(1));
    let one = NodeConfig::new(NodeId(1), "mem", 9501);
    Arc::new(Config::new("pair", params, vec![zero, one]).unwrap())
}

#[tokio::test]
async fn test_source_mismatch_stops_node() {
    let config = pair();
    let transport = MemoryTransport::new();

    // Play node 0 by hand; node 1 dials it during bootstrap.
    let mut listener = transport
        .listen(NodeId(0), &config.node(NodeId(0)).unwrap().address())
        .await
        .unwrap();
    let node = tokio::spawn(Node::new(NodeId(1), config.clone(), transport.clone()).run());

    let mut channel = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("node 1 connects")
        .unwrap();
    assert_eq!(channel.peer(), NodeId(1));

    // A marker on the 0 -> 1 channel that claims to come from node 1
    channel
        .send(&Message::Marker { source: NodeId(1) })
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), node)
        .await
        .expect("node stops")
        .unwrap();
    assert_matches!(
        result,
        Err(NodeError::Protocol(ProtocolViolation::SourceMismatch {
            claimed: NodeId(1),
            channel: NodeId(0),
            kind: "marker",
        }))
    );

    let next = tokio::time::timeout(Duration::from_secs(5), channel.receive())
        .await
        .expect("channel closes")
        .unwrap();
    assert!(next.is_none());
}
