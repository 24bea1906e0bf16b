//! Initiator-side collection of snapshot reports into global states.

use cutline_core::{verify, ConsistencyReport, ConsistencyRule, GlobalState, NodeId, SnapshotReport};
use std::collections::BTreeSet;

/// Folds reports for the current round until every node has contributed.
///
/// A round is complete once the initiator's own report and one report from each of the other
/// `nodes - 1` participants have arrived, in any order.
#[derive(Debug, Clone)]
pub struct GlobalStateAggregator {
    initiator: NodeId,
    nodes: usize,
    round: u64,
    global: GlobalState,
    reported: BTreeSet<NodeId>,
}

impl GlobalStateAggregator {
    /// Aggregator for a topology of `nodes` participants
    pub fn new(initiator: NodeId, nodes: usize) -> Self {
        Self {
            initiator,
            nodes,
            round: 0,
            global: GlobalState::new(),
            reported: BTreeSet::new(),
        }
    }

    /// Rounds completed so far
    pub fn rounds_completed(&self) -> u64 {
        self.round
    }

    /// Reports folded into the open round
    pub fn pending(&self) -> usize {
        self.reported.len()
    }

    /// True once the initiator's own report for the open round is in
    pub fn has_own_report(&self) -> bool {
        self.reported.contains(&self.initiator)
    }

    /// Fold `report`; returns the completed global state when it was the last one missing.
    ///
    /// A second report from the same node within a round is dropped.
    pub fn on_report(&mut self, report: SnapshotReport) -> Option<GlobalState> {
        if !self.reported.insert(report.source) {
            tracing::warn!(
                round = self.round + 1,
                origin = %report.source,
                "duplicate snapshot report dropped"
            );
            return None;
        }
        tracing::debug!(
            round = self.round + 1,
            origin = %report.source,
            received = self.reported.len(),
            expected = self.nodes,
            "snapshot report aggregated"
        );
        self.global.absorb(report);

        if self.reported.len() < self.nodes || !self.has_own_report() {
            return None;
        }
        self.round += 1;
        self.reported.clear();
        Some(std::mem::take(&mut self.global))
    }
}

/// One verified snapshot round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// 1-based round number
    pub round: u64,
    /// Collected cut
    pub global: GlobalState,
    /// Verdict of the consistency check
    pub consistency: ConsistencyReport,
    /// All nodes passive and nothing in flight
    pub quiescent: bool,
}

impl RoundOutcome {
    /// Verify `global` under `rule`
    pub fn evaluate(round: u64, global: GlobalState, rule: ConsistencyRule) -> Self {
        let consistency = verify(&global, rule);
        let quiescent = global.is_quiescent();
        Self {
            round,
            global,
            consistency,
            quiescent,
        }
    }
}
