//! Length-prefixed message framing.
//!
//! Wire layout per frame:
//! - 4 bytes: payload length (u32, big endian)
//! - payload: `bincode` encoded [`Message`]

use crate::{TransportError, TransportResult};
use cutline_core::{Message, NodeId};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted from a peer
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Read half of a channel
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of a channel
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Decodes frames from the receive half of a channel.
pub struct FrameReader {
    peer: NodeId,
    inner: BoxedReader,
}

impl FrameReader {
    /// Wrap the read half of a channel to `peer`
    pub fn new(peer: NodeId, inner: BoxedReader) -> Self {
        Self { peer, inner }
    }

    /// Remote end of the channel
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Next message in send order, `None` once the peer closed the channel cleanly.
    ///
    /// A stream that ends in the middle of a frame is an error.
    pub async fn receive(&mut self) -> TransportResult<Option<Message>> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            let read = self.inner.read(&mut header[filled..]).await?;
            if read == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TransportError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += read;
        }

        let size = u32::from_be_bytes(header) as usize;
        if size > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                size,
                limit: MAX_FRAME_LEN,
            });
        }

        let mut payload = vec![0u8; size];
        self.inner.read_exact(&mut payload).await?;
        Ok(Some(Message::from_bytes(&payload)?))
    }
}

/// Encodes frames onto the send half of a channel.
///
/// Exactly one writer exists per channel, which is what keeps delivery FIFO.
pub struct FrameWriter {
    peer: NodeId,
    inner: BoxedWriter,
}

impl FrameWriter {
    /// Wrap the write half of a channel to `peer`
    pub fn new(peer: NodeId, inner: BoxedWriter) -> Self {
        Self { peer, inner }
    }

    /// Remote end of the channel
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Write one message and flush it
    pub async fn send(&mut self, message: &Message) -> TransportResult<()> {
        let payload = message.to_bytes()?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                limit: MAX_FRAME_LEN,
            });
        }
        let size = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_LEN,
        })?;

        self.inner.write_all(&size.to_be_bytes()).await?;
        self.inner.write_all(&payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and close the write half so the peer observes end-of-stream
    pub async fn close(&mut self) -> TransportResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
