//! Node runtime errors

use crate::results::ResultWriteError;
use cutline_core::{NodeId, ProtocolViolation};
use cutline_transport::TransportError;

/// Anything that stops a node before it finishes cleanly.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The id is not part of the topology
    #[error("node {0} is not in the topology")]
    UnknownNode(NodeId),

    /// Channel setup or I/O failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A peer or local call broke the snapshot protocol
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Neighbor connections could not be established
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// A runtime task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(String),

    /// Snapshot results could not be persisted
    #[error(transparent)]
    Results(#[from] ResultWriteError),
}

impl NodeError {
    /// Create a bootstrap error
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap(message.into())
    }
}
