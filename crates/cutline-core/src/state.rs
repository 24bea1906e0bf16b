//! Snapshot records: per-node local states, per-channel in-flight messages and the
//! initiator's global accumulator.

use crate::clock::VectorClock;
use crate::identifiers::NodeId;
use crate::messages::SnapshotReport;
use serde::{Deserialize, Serialize};

/// Workload activity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActivityState {
    /// Currently emitting application messages
    Active,
    /// Idle until an application message re-activates it
    #[default]
    Passive,
}

/// Whether a node is recording channel state for an open snapshot round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MarkerMode {
    /// No round open
    #[default]
    Unmarked,
    /// Local state recorded, channels being recorded
    Marked,
}

/// A node's state at the cut, taken once per round when it first becomes marked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    /// Recording node
    pub node: NodeId,
    /// Copy of the node's vector clock at mark time
    pub clock: VectorClock,
    /// Activity at mark time
    pub activity: ActivityState,
}

impl LocalState {
    /// Record a local state
    pub fn new(node: NodeId, clock: VectorClock, activity: ActivityState) -> Self {
        Self {
            node,
            clock,
            activity,
        }
    }

    /// The node's own event count at the cut
    pub fn own_count(&self) -> u64 {
        self.clock.get(self.node)
    }
}

/// An application message that was in flight on `source → destination` when the cut was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Sending end of the channel
    pub source: NodeId,
    /// Receiving (recording) end of the channel
    pub destination: NodeId,
    /// Vector clock carried by the in-flight message
    pub clock: VectorClock,
}

impl ChannelState {
    /// Record an in-flight message
    pub fn new(source: NodeId, destination: NodeId, clock: VectorClock) -> Self {
        Self {
            source,
            destination,
            clock,
        }
    }
}

/// Accumulated snapshot at the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalState {
    /// Local states in arrival order
    pub local_states: Vec<LocalState>,
    /// Channel states in arrival order
    pub channel_states: Vec<ChannelState>,
}

impl GlobalState {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one node's report into the accumulator
    pub fn absorb(&mut self, report: SnapshotReport) {
        self.local_states.push(report.local_state);
        self.channel_states.extend(report.channel_states);
    }

    /// Number of local states held
    pub fn len(&self) -> usize {
        self.local_states.len()
    }

    /// True when nothing has been absorbed
    pub fn is_empty(&self) -> bool {
        self.local_states.is_empty() && self.channel_states.is_empty()
    }

    /// True once exactly `nodes` local states are held
    pub fn is_complete(&self, nodes: usize) -> bool {
        self.local_states.len() == nodes
    }

    /// Every node passive at the cut and no message in flight: the workload has terminated.
    pub fn is_quiescent(&self) -> bool {
        self.channel_states.is_empty()
            && self
                .local_states
                .iter()
                .all(|s| s.activity == ActivityState::Passive)
    }

    /// Clear for the next round
    pub fn reset(&mut self) {
        self.local_states.clear();
        self.channel_states.clear();
    }

    /// Local state recorded by `node`, if present
    pub fn local_state_of(&self, node: NodeId) -> Option<&LocalState> {
        self.local_states.iter().find(|s| s.node == node)
    }
}
