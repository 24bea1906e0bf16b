//! Transport errors

use std::io;

/// Failures while establishing or using a peer channel.
///
/// End-of-stream is not an error: [`crate::FrameReader::receive`] reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Listening socket could not be opened
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Requested address
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Outbound connection failed
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Remote address
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// No in-memory listener registered under the address
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// Listener has been shut down
    #[error("listener closed: {0}")]
    ListenerClosed(String),

    /// Connection opened but the peer id exchange failed
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Frame header announced an oversized payload
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Announced payload size
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Read or write failed, including end-of-stream inside a frame
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Create a handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake(message.into())
    }
}

/// Result alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
