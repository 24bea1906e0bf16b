//! Peer channels and the connection handshake.

use crate::frame::{FrameReader, FrameWriter};
use crate::{TransportError, TransportResult};
use cutline_core::{Message, NodeId};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bidirectional FIFO channel to one neighbor.
pub struct Channel {
    peer: NodeId,
    reader: FrameReader,
    writer: FrameWriter,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("peer", &self.peer).finish()
    }
}

impl Channel {
    /// Wrap an established byte stream to `peer`
    pub fn new<S>(peer: NodeId, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        Self {
            peer,
            reader: FrameReader::new(peer, Box::new(read)),
            writer: FrameWriter::new(peer, Box::new(write)),
        }
    }

    /// Dialing side: announce `local`, then treat the stream as a channel to `peer`
    pub async fn dial<S>(local: NodeId, peer: NodeId, mut stream: S) -> TransportResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        stream
            .write_all(&local.0.to_be_bytes())
            .await
            .map_err(|e| TransportError::handshake(format!("failed to send node id: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| TransportError::handshake(format!("failed to flush node id: {e}")))?;
        Ok(Self::new(peer, stream))
    }

    /// Accepting side: learn the peer id from the handshake
    pub async fn accept<S>(mut stream: S) -> TransportResult<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut id = [0u8; 4];
        stream
            .read_exact(&mut id)
            .await
            .map_err(|e| TransportError::handshake(format!("failed to read node id: {e}")))?;
        Ok(Self::new(NodeId(u32::from_be_bytes(id)), stream))
    }

    /// Remote end of the channel
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Send one message
    pub async fn send(&mut self, message: &Message) -> TransportResult<()> {
        self.writer.send(message).await
    }

    /// Receive the next message, `None` at end-of-stream
    pub async fn receive(&mut self) -> TransportResult<Option<Message>> {
        self.reader.receive().await
    }

    /// Separate halves so one task can read while another writes
    pub fn split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}
