//! Chandy–Lamport snapshot state machine.
//!
//! The engine is pure: every handler mutates local state and returns the [`Action`]s the
//! runtime must perform. The runtime calls it under the node lock and enqueues the resulting
//! sends before releasing the lock, so no application message can overtake a marker that was
//! logically sent before it.
//!
//! ```text
//!             initiate / first Marker
//!   UNMARKED ─────────────────────────▶ MARKED
//!       ▲      (record local state,        │
//!       │       broadcast Marker)          │ Marker from every neighbor
//!       └──────────────────────────────────┘ (report up the tree)
//! ```

use cutline_core::{
    ActivityState, ChannelState, Config, LocalState, MarkerMode, Message, NodeId,
    ProtocolViolation, SnapshotReport, VectorClock,
};
use std::collections::BTreeSet;

/// Effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Enqueue `message` on the channel to `to`
    Send {
        /// Neighbor
        to: NodeId,
        /// Message to send
        message: Message,
    },
    /// Initiator only: hand a report (remote or its own) to the aggregator
    Aggregate(SnapshotReport),
}

/// Per-node protocol state.
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    id: NodeId,
    initiator: NodeId,
    neighbors: BTreeSet<NodeId>,
    clock: VectorClock,
    activity: ActivityState,
    mode: MarkerMode,
    marker_log: BTreeSet<NodeId>,
    forwarder: Option<NodeId>,
    pending_local: Option<LocalState>,
    pending_channels: Vec<ChannelState>,
    rounds_closed: u64,
}

impl SnapshotEngine {
    /// Fresh engine for `id` in a topology of `nodes` participants
    pub fn new(id: NodeId, initiator: NodeId, neighbors: BTreeSet<NodeId>, nodes: usize) -> Self {
        Self {
            id,
            initiator,
            neighbors,
            clock: VectorClock::new(nodes),
            activity: ActivityState::Passive,
            mode: MarkerMode::Unmarked,
            marker_log: BTreeSet::new(),
            forwarder: None,
            pending_local: None,
            pending_channels: Vec::new(),
            rounds_closed: 0,
        }
    }

    /// Engine for `id` as described by `config`
    pub fn from_config(id: NodeId, config: &Config) -> Self {
        Self::new(
            id,
            config.parameters.initiator,
            config.neighbors(id),
            config.node_count(),
        )
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True at the designated initiator
    pub fn is_initiator(&self) -> bool {
        self.id == self.initiator
    }

    /// Configured neighbors
    pub fn neighbors(&self) -> &BTreeSet<NodeId> {
        &self.neighbors
    }

    /// Current vector clock
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Current workload activity
    pub fn activity(&self) -> ActivityState {
        self.activity
    }

    /// Set by the workload generator on (de)activation
    pub fn set_activity(&mut self, activity: ActivityState) {
        self.activity = activity;
    }

    /// Marked while a round is open at this node
    pub fn mode(&self) -> MarkerMode {
        self.mode
    }

    /// Neighbors whose marker arrived in the current round
    pub fn marker_log(&self) -> &BTreeSet<NodeId> {
        &self.marker_log
    }

    /// Parent in the current (or last) snapshot tree
    pub fn forwarder(&self) -> Option<NodeId> {
        self.forwarder
    }

    /// Local state recorded for the open round
    pub fn pending_local(&self) -> Option<&LocalState> {
        self.pending_local.as_ref()
    }

    /// Channel states recorded so far in the open round
    pub fn pending_channels(&self) -> &[ChannelState] {
        &self.pending_channels
    }

    /// Rounds this node has closed locally
    pub fn rounds_closed(&self) -> u64 {
        self.rounds_closed
    }

    /// Send event: tick the clock and build the application message carrying it
    pub fn prepare_application(&mut self) -> Message {
        Message::Application {
            source: self.id,
            clock: self.clock.on_send(self.id),
        }
    }

    /// Start a round at the initiator; a no-op while a round is already open here.
    pub fn initiate(&mut self) -> Result<Vec<Action>, ProtocolViolation> {
        if !self.is_initiator() {
            return Err(ProtocolViolation::NotInitiator { node: self.id });
        }
        let mut actions = Vec::new();
        if self.mode == MarkerMode::Marked {
            tracing::debug!(node = %self.id, "round already open, initiate ignored");
            return Ok(actions);
        }
        self.mark(&mut actions);
        self.close_round_if_complete(&mut actions)?;
        Ok(actions)
    }

    /// Marker from `sender`
    pub fn on_marker(&mut self, sender: NodeId) -> Result<Vec<Action>, ProtocolViolation> {
        self.require_neighbor(sender, "marker")?;
        let mut actions = Vec::new();

        if self.mode == MarkerMode::Unmarked {
            self.forwarder = Some(sender);
            self.mark(&mut actions);
        }
        if !self.marker_log.insert(sender) {
            tracing::debug!(node = %self.id, peer = %sender, "duplicate marker in round");
        }
        self.close_round_if_complete(&mut actions)?;
        Ok(actions)
    }

    /// Application message from `sender` carrying `clock`.
    ///
    /// Always updates causality; while marked, also records the message as in flight on
    /// `sender → self` unless that channel's marker has already arrived.
    pub fn on_application(
        &mut self,
        sender: NodeId,
        clock: &VectorClock,
    ) -> Result<(), ProtocolViolation> {
        self.require_neighbor(sender, "application")?;
        self.clock.observe(self.id, clock)?;

        if self.mode == MarkerMode::Marked && !self.marker_log.contains(&sender) {
            self.pending_channels
                .push(ChannelState::new(sender, self.id, clock.clone()));
        }
        Ok(())
    }

    /// Snapshot report travelling towards the initiator
    pub fn on_snapshot(
        &mut self,
        report: SnapshotReport,
    ) -> Result<Vec<Action>, ProtocolViolation> {
        if self.is_initiator() {
            return Ok(vec![Action::Aggregate(report)]);
        }
        let to = self.forwarder.ok_or(ProtocolViolation::NoForwarder {
            node: self.id,
            origin: report.source,
        })?;
        Ok(vec![Action::Send {
            to,
            message: Message::Snapshot(report),
        }])
    }

    fn require_neighbor(&self, sender: NodeId, kind: &'static str) -> Result<(), ProtocolViolation> {
        if self.neighbors.contains(&sender) {
            Ok(())
        } else {
            Err(ProtocolViolation::NotANeighbor {
                node: self.id,
                from: sender,
                kind,
            })
        }
    }

    /// Record the local state and broadcast markers
    fn mark(&mut self, actions: &mut Vec<Action>) {
        self.pending_local = Some(LocalState::new(self.id, self.clock.clone(), self.activity));
        self.pending_channels.clear();
        self.mode = MarkerMode::Marked;
        actions.extend(self.neighbors.iter().map(|neighbor| Action::Send {
            to: *neighbor,
            message: Message::Marker { source: self.id },
        }));
        tracing::debug!(node = %self.id, clock = %self.clock, "local state recorded");
    }

    fn close_round_if_complete(&mut self, actions: &mut Vec<Action>) -> Result<(), ProtocolViolation> {
        if self.mode != MarkerMode::Marked || self.marker_log != self.neighbors {
            return Ok(());
        }
        self.mode = MarkerMode::Unmarked;
        self.marker_log.clear();
        self.rounds_closed += 1;
        let channel_states = std::mem::take(&mut self.pending_channels);
        let Some(local_state) = self.pending_local.take() else {
            return Ok(());
        };

        tracing::debug!(
            node = %self.id,
            in_flight = channel_states.len(),
            "round closed locally"
        );
        let report = SnapshotReport {
            source: self.id,
            local_state,
            channel_states,
        };
        if self.is_initiator() {
            actions.push(Action::Aggregate(report));
        } else {
            let to = self.forwarder.ok_or(ProtocolViolation::NoForwarder {
                node: self.id,
                origin: self.id,
            })?;
            actions.push(Action::Send {
                to,
                message: Message::Snapshot(report),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn engine(id: u32, neighbors: &[u32], nodes: usize) -> SnapshotEngine {
        SnapshotEngine::new(
            NodeId(id),
            NodeId(0),
            neighbors.iter().copied().map(NodeId).collect(),
            nodes,
        )
    }

    fn sends(actions: &[Action]) -> Vec<(NodeId, &'static str)> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send { to, message } => Some((*to, message.kind())),
                Action::Aggregate(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_initiate_records_and_broadcasts() {
        let mut e = engine(0, &[1, 2], 3);
        e.prepare_application();
        let actions = e.initiate().unwrap();

        assert_eq!(e.mode(), MarkerMode::Marked);
        assert_eq!(e.pending_local().unwrap().clock.entries(), &[1, 0, 0]);
        assert_eq!(
            sends(&actions),
            vec![(NodeId(1), "marker"), (NodeId(2), "marker")]
        );
        assert!(e.initiate().unwrap().is_empty(), "re-entrant initiate is a no-op");
    }

    #[test]
    fn test_only_initiator_may_initiate() {
        let mut e = engine(1, &[0], 2);
        assert_matches!(e.initiate(), Err(ProtocolViolation::NotInitiator { .. }));
    }

    #[test]
    fn test_first_marker_sets_forwarder_and_closes_after_all_neighbors() {
        let mut e = engine(2, &[0, 1, 3], 4);

        let actions = e.on_marker(NodeId(1)).unwrap();
        assert_eq!(e.forwarder(), Some(NodeId(1)));
        assert_eq!(sends(&actions).len(), 3);

        assert!(e.on_marker(NodeId(3)).unwrap().is_empty());
        assert_eq!(e.mode(), MarkerMode::Marked);

        let actions = e.on_marker(NodeId(0)).unwrap();
        assert_eq!(e.mode(), MarkerMode::Unmarked);
        assert!(e.marker_log().is_empty());
        assert!(e.pending_local().is_none());
        assert_eq!(sends(&actions), vec![(NodeId(1), "snapshot")]);
        // Retained for child reports still in flight.
        assert_eq!(e.forwarder(), Some(NodeId(1)));
    }

    #[test]
    fn test_channel_recording_stops_per_channel_at_its_marker() {
        let mut e = engine(1, &[0, 2], 3);
        e.on_marker(NodeId(0)).unwrap();

        let from_two = VectorClock::from_entries(vec![0, 0, 4]);
        let from_zero = VectorClock::from_entries(vec![7, 0, 0]);
        e.on_application(NodeId(2), &from_two).unwrap();
        // Channel 0 → 1 is already closed by its marker.
        e.on_application(NodeId(0), &from_zero).unwrap();

        assert_eq!(
            e.pending_channels(),
            &[ChannelState::new(NodeId(2), NodeId(1), from_two)]
        );
        assert_eq!(e.clock().entries(), &[7, 2, 4]);
    }

    #[test]
    fn test_unmarked_application_only_updates_clock() {
        let mut e = engine(1, &[0], 2);
        e.on_application(NodeId(0), &VectorClock::from_entries(vec![3, 0]))
            .unwrap();
        assert!(e.pending_channels().is_empty());
        assert_eq!(e.clock().entries(), &[3, 1]);
    }

    #[test]
    fn test_non_neighbor_messages_are_violations() {
        let mut e = engine(1, &[0], 3);
        assert_matches!(
            e.on_marker(NodeId(2)),
            Err(ProtocolViolation::NotANeighbor { kind: "marker", .. })
        );
        assert_matches!(
            e.on_application(NodeId(2), &VectorClock::new(3)),
            Err(ProtocolViolation::NotANeighbor { .. })
        );
        assert!(e.marker_log().is_empty());
    }

    #[test]
    fn test_snapshot_without_forwarder_is_a_violation() {
        let mut e = engine(1, &[0], 2);
        let report = SnapshotReport {
            source: NodeId(1),
            local_state: LocalState::new(NodeId(1), VectorClock::new(2), ActivityState::Passive),
            channel_states: Vec::new(),
        };
        assert_matches!(
            e.on_snapshot(report),
            Err(ProtocolViolation::NoForwarder { .. })
        );
    }

    #[test]
    fn test_isolated_initiator_completes_immediately() {
        let mut e = engine(0, &[], 1);
        let actions = e.initiate().unwrap();
        assert_eq!(e.mode(), MarkerMode::Unmarked);
        assert_matches!(actions.as_slice(), [Action::Aggregate(report)] if report.channel_states.is_empty());
    }

    #[test]
    fn test_initiator_folds_own_report() {
        let mut e = engine(0, &[1], 2);
        e.initiate().unwrap();
        e.on_application(NodeId(1), &VectorClock::from_entries(vec![0, 2]))
            .unwrap();
        let actions = e.on_marker(NodeId(1)).unwrap();
        assert_matches!(
            actions.as_slice(),
            [Action::Aggregate(report)] if report.source == NodeId(0) && report.channel_states.len() == 1
        );
    }
}
