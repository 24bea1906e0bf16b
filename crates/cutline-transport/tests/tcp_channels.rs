//! TCP transport end-to-end: handshake, FIFO delivery, end-of-stream.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cutline_core::{
    ActivityState, ChannelState, LocalState, Message, NodeId, SnapshotReport, VectorClock,
};
use cutline_transport::{Listener, TcpTransport, Transport, TransportError};

#[tokio::test]
async fn test_tcp_channel_is_fifo_and_reports_eof() {
    let transport = TcpTransport::new();
    let mut listener = transport
        .listen(NodeId(1), "127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_address();

    let acceptor = tokio::spawn(async move {
        let channel = listener.accept().await.expect("accept");
        assert_eq!(channel.peer(), NodeId(0));
        let (mut reader, _writer) = channel.split();
        let mut received = Vec::new();
        while let Some(message) = reader.receive().await.expect("receive") {
            received.push(message);
        }
        received
    });

    let channel = transport
        .connect(NodeId(0), NodeId(1), &address)
        .await
        .expect("connect");
    let (_reader, mut writer) = channel.split();

    let mut expected = Vec::new();
    for i in 0..50u64 {
        let message = if i % 10 == 9 {
            Message::Marker { source: NodeId(0) }
        } else {
            Message::Application {
                source: NodeId(0),
                clock: VectorClock::from_entries(vec![i + 1, 0]),
            }
        };
        writer.send(&message).await.expect("send");
        expected.push(message);
    }
    let report = Message::Snapshot(SnapshotReport {
        source: NodeId(0),
        local_state: LocalState::new(
            NodeId(0),
            VectorClock::from_entries(vec![45, 3]),
            ActivityState::Passive,
        ),
        channel_states: vec![ChannelState::new(
            NodeId(1),
            NodeId(0),
            VectorClock::from_entries(vec![2, 3]),
        )],
    });
    writer.send(&report).await.expect("send report");
    expected.push(report);
    writer.close().await.expect("close");

    assert_eq!(acceptor.await.expect("acceptor task"), expected);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind");
        probe.local_addr().expect("probe addr").port()
    };
    let result = TcpTransport::new()
        .connect(NodeId(0), NodeId(1), &format!("127.0.0.1:{port}"))
        .await;
    assert!(matches!(result, Err(TransportError::Connect { .. })));
}
