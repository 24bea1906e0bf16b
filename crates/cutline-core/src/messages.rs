//! Peer-to-peer protocol messages.
//!
//! Messages carry no destination: the channel that delivers a message identifies both ends.
//! The binary encoding is `bincode` over the serde representation.

use crate::clock::VectorClock;
use crate::identifiers::NodeId;
use crate::state::{ChannelState, LocalState};
use serde::{Deserialize, Serialize};

/// One node's contribution to a snapshot, routed up the spanning tree to the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    /// Node that produced the report
    pub source: NodeId,
    /// Its local state at the cut
    pub local_state: LocalState,
    /// Messages it recorded as in flight on its incoming channels
    pub channel_states: Vec<ChannelState>,
}

/// Everything a peer can send over a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Workload traffic stamped with the sender's vector clock
    Application {
        /// Sending node
        source: NodeId,
        /// Sender's clock after the send event
        clock: VectorClock,
    },
    /// Chandy–Lamport marker separating pre-cut from post-cut traffic
    Marker {
        /// Sending node
        source: NodeId,
    },
    /// Snapshot report travelling towards the initiator
    Snapshot(SnapshotReport),
    /// Termination broadcast after a quiescent snapshot
    Finish {
        /// Node forwarding the broadcast
        source: NodeId,
    },
}

impl Message {
    /// Short name used in logs and violation reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Application { .. } => "application",
            Self::Marker { .. } => "marker",
            Self::Snapshot(_) => "snapshot",
            Self::Finish { .. } => "finish",
        }
    }

    /// Node that put this message on the wire (the report origin for snapshots)
    pub fn source(&self) -> NodeId {
        match self {
            Self::Application { source, .. } | Self::Marker { source } | Self::Finish { source } => {
                *source
            }
            Self::Snapshot(report) => report.source,
        }
    }

    /// Encode for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from the wire
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
