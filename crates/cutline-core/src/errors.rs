//! Error types shared by every cutline crate
//!
//! Two families live here: [`ProtocolViolation`] for broken protocol contracts (these are
//! programming errors and the node treats them as fatal) and [`ConfigError`] for bad
//! topology or parameter files.

use crate::identifiers::NodeId;
use std::path::PathBuf;

/// A message or call that the snapshot protocol never produces on a correct topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// Message delivered from a node that is not a configured neighbor
    #[error("node {node} received {kind} from non-neighbor {from}")]
    NotANeighbor {
        /// Receiving node
        node: NodeId,
        /// Claimed sender
        from: NodeId,
        /// Message kind
        kind: &'static str,
    },

    /// Message `source` does not match the channel it arrived on
    #[error("{kind} claiming source {claimed} arrived on channel from {channel}")]
    SourceMismatch {
        /// Source carried in the message
        claimed: NodeId,
        /// Peer of the delivering channel
        channel: NodeId,
        /// Message kind
        kind: &'static str,
    },

    /// Snapshot report reached a non-initiator that has no parent in the tree
    #[error("node {node} has no forwarder for snapshot report from {origin}")]
    NoForwarder {
        /// Node holding the report
        node: NodeId,
        /// Node that produced the report
        origin: NodeId,
    },

    /// Only the designated initiator may start a round
    #[error("node {node} is not the snapshot initiator")]
    NotInitiator {
        /// Node asked to initiate
        node: NodeId,
    },

    /// Incoming vector clock has the wrong number of entries
    #[error("vector clock has {actual} entries, expected {expected}")]
    ClockDimension {
        /// Node count
        expected: usize,
        /// Entries received
        actual: usize,
    },
}

/// Failure to load or validate a topology description.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Text format was truncated or malformed
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number, 0 when the input ended early
        line: usize,
        /// What went wrong
        message: String,
    },

    /// TOML document did not match the expected schema
    #[error("invalid TOML topology: {0}")]
    Toml(#[from] toml::de::Error),

    /// Parsed values violate a topology invariant
    #[error("invalid topology: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a parse error at `line`
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
