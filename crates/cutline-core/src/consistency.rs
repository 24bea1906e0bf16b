//! Post-hoc consistency verification of a completed global state.
//!
//! A cut is consistent when no node's recorded state reflects more of another node's events
//! than that node itself recorded: for every pair `(e, f)`, `f.clock[e] <= e.clock[e]`.
//! Any violation is an orphan receive (a message received before the cut but sent after it).
//!
//! Two predicates are available through [`ConsistencyRule`]. [`ConsistencyRule::Causal`]
//! implements the condition above. [`ConsistencyRule::NonStrict`] additionally rejects pairs
//! where `f` has seen exactly as many of `e`'s events as `e` recorded; it reproduces an older
//! revision of the checker and flags legitimate cuts (including the all-zero snapshot), so it is
//! kept for comparison only.

use crate::identifiers::NodeId;
use crate::state::GlobalState;
use serde::{Deserialize, Serialize};

/// Pairwise predicate used by [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyRule {
    /// Reject when `e.clock[e] < f.clock[e]`
    #[default]
    Causal,
    /// Reject when `e.clock[e] <= f.clock[e]`
    NonStrict,
}

impl ConsistencyRule {
    fn rejects(self, recorded: u64, observed: u64) -> bool {
        match self {
            Self::Causal => recorded < observed,
            Self::NonStrict => recorded <= observed,
        }
    }
}

/// First offending pair found by [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingViolation {
    /// Node whose own count is compared
    pub owner: NodeId,
    /// Node whose knowledge of `owner` is compared
    pub observer: NodeId,
    /// `owner.clock[owner]`
    pub recorded: u64,
    /// `observer.clock[owner]`
    pub observed: u64,
}

/// Outcome of checking a global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Rule that was applied
    pub rule: ConsistencyRule,
    /// First violating pair, `None` when the cut is consistent
    pub violation: Option<OrderingViolation>,
}

impl ConsistencyReport {
    /// True when no pair violated the rule
    pub fn is_consistent(&self) -> bool {
        self.violation.is_none()
    }
}

/// Check every ordered pair of distinct local states against `rule`.
pub fn verify(global: &GlobalState, rule: ConsistencyRule) -> ConsistencyReport {
    for (i, e) in global.local_states.iter().enumerate() {
        let recorded = e.own_count();
        for (j, f) in global.local_states.iter().enumerate() {
            if i == j {
                continue;
            }
            let observed = f.clock.get(e.node);
            if rule.rejects(recorded, observed) {
                return ConsistencyReport {
                    rule,
                    violation: Some(OrderingViolation {
                        owner: e.node,
                        observer: f.node,
                        recorded,
                        observed,
                    }),
                };
            }
        }
    }
    ConsistencyReport {
        rule,
        violation: None,
    }
}

/// Boolean form of [`verify`].
///
/// Pass [`ConsistencyRule::NonStrict`] for the `<=` predicate, which also rejects pairs with
/// equal counts.
pub fn is_consistent(global: &GlobalState, rule: ConsistencyRule) -> bool {
    verify(global, rule).is_consistent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VectorClock;
    use crate::state::{ActivityState, LocalState};

    fn global(clocks: &[&[u64]]) -> GlobalState {
        GlobalState {
            local_states: clocks
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    LocalState::new(
                        NodeId(i as u32),
                        VectorClock::from_entries(c.to_vec()),
                        ActivityState::Passive,
                    )
                })
                .collect(),
            channel_states: Vec::new(),
        }
    }

    #[test]
    fn test_quiet_snapshot_is_causally_consistent() {
        let g = global(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
        assert!(is_consistent(&g, ConsistencyRule::Causal));
        // The non-strict predicate rejects the all-zero cut.
        assert!(!is_consistent(&g, ConsistencyRule::NonStrict));
    }

    #[test]
    fn test_default_rule_is_causal() {
        assert_eq!(ConsistencyRule::default(), ConsistencyRule::Causal);
        let g = global(&[&[2, 1], &[1, 1]]);
        assert!(verify(&g, ConsistencyRule::default()).is_consistent());
        assert_eq!(
            verify(&g, ConsistencyRule::NonStrict).violation,
            Some(OrderingViolation {
                owner: NodeId(1),
                observer: NodeId(0),
                recorded: 1,
                observed: 1,
            })
        );
    }

    #[test]
    fn test_orphan_receive_is_rejected_by_both_rules() {
        // Node 1 has seen 3 events of node 0, but node 0 only recorded 2.
        let g = global(&[&[2, 0, 0], &[3, 4, 0], &[0, 0, 1]]);
        let report = verify(&g, ConsistencyRule::Causal);
        assert_eq!(
            report.violation,
            Some(OrderingViolation {
                owner: NodeId(0),
                observer: NodeId(1),
                recorded: 2,
                observed: 3,
            })
        );
        assert!(!is_consistent(&g, ConsistencyRule::NonStrict));
    }

    #[test]
    fn test_delivered_message_inside_cut() {
        // Node 0 sent at count 1 and node 1 received before its cut.
        let g = global(&[&[1, 0], &[1, 1]]);
        assert!(is_consistent(&g, ConsistencyRule::Causal));
        assert!(!is_consistent(&g, ConsistencyRule::NonStrict));
    }

    #[test]
    fn test_non_strict_accepts_strictly_behind_knowledge() {
        let g = global(&[&[3, 0, 1], &[2, 5, 1], &[1, 4, 6]]);
        assert!(is_consistent(&g, ConsistencyRule::NonStrict));
        assert!(is_consistent(&g, ConsistencyRule::Causal));
    }
}
