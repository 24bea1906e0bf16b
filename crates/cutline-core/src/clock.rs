//! Fidge–Mattern vector clocks.
//!
//! Entry `i` holds node `i`'s logical event count as last known to the owner. The owner's
//! own entry strictly increases on every send and receive; every other entry only grows
//! through [`VectorClock::observe`].

use crate::errors::ProtocolViolation;
use crate::identifiers::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense vector clock sized to the node count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct VectorClock(Vec<u64>);

impl VectorClock {
    /// All-zero clock for `nodes` participants
    pub fn new(nodes: usize) -> Self {
        Self(vec![0; nodes])
    }

    /// Wrap explicit entries
    pub fn from_entries(entries: Vec<u64>) -> Self {
        Self(entries)
    }

    /// Number of participants tracked
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-dimension clock
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry for `node`, zero when out of range
    pub fn get(&self, node: NodeId) -> u64 {
        self.0.get(node.index()).copied().unwrap_or(0)
    }

    /// Raw entries in node id order
    pub fn entries(&self) -> &[u64] {
        &self.0
    }

    /// Send event at `owner`: increment the owner's entry.
    ///
    /// Returns a copy of the resulting vector, which is what an outgoing
    /// application message carries.
    pub fn on_send(&mut self, owner: NodeId) -> VectorClock {
        self.increment(owner);
        self.clone()
    }

    /// Receive event at `owner`: component-wise max with `incoming`, then increment
    /// the owner's entry. The merge always happens before the increment.
    pub fn observe(&mut self, owner: NodeId, incoming: &VectorClock) -> Result<(), ProtocolViolation> {
        if incoming.len() != self.len() {
            return Err(ProtocolViolation::ClockDimension {
                expected: self.len(),
                actual: incoming.len(),
            });
        }
        for (mine, theirs) in self.0.iter_mut().zip(incoming.0.iter()) {
            *mine = (*mine).max(*theirs);
        }
        self.increment(owner);
        Ok(())
    }

    fn increment(&mut self, owner: NodeId) {
        debug_assert!(
            owner.index() < self.0.len(),
            "node {owner} outside clock of size {}",
            self.0.len()
        );
        if let Some(entry) = self.0.get_mut(owner.index()) {
            *entry = entry.saturating_add(1);
        }
    }
}

impl fmt::Display for VectorClock {
    /// Space separated entries, the result file line format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{entry}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_merge_then_increment() {
        let mut clock = VectorClock::from_entries(vec![2, 0, 0]);
        clock
            .observe(NodeId(0), &VectorClock::from_entries(vec![0, 1, 0]))
            .unwrap();
        assert_eq!(clock.entries(), &[3, 1, 0]);
    }

    #[test]
    fn test_send_returns_post_increment_copy() {
        let mut clock = VectorClock::new(3);
        let carried = clock.on_send(NodeId(1));
        assert_eq!(carried.entries(), &[0, 1, 0]);
        assert_eq!(carried, clock);
    }

    #[test]
    fn test_observe_rejects_wrong_dimension() {
        let mut clock = VectorClock::new(3);
        let err = clock
            .observe(NodeId(0), &VectorClock::new(2))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::ClockDimension {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(clock.entries(), &[0, 0, 0]);
    }

    #[test]
    fn test_display_is_space_separated() {
        assert_eq!(VectorClock::from_entries(vec![4, 0, 12]).to_string(), "4 0 12");
        assert_eq!(VectorClock::new(0).to_string(), "");
    }

    #[derive(Debug, Clone)]
    enum Event {
        Send,
        Receive(Vec<u64>),
    }

    fn event(nodes: usize) -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Send),
            prop::collection::vec(0u64..50, nodes).prop_map(Event::Receive),
        ]
    }

    proptest! {
        #[test]
        fn prop_owner_entry_strictly_increases(events in prop::collection::vec(event(4), 1..64)) {
            let owner = NodeId(2);
            let mut clock = VectorClock::new(4);

            for ev in events {
                let before = clock.clone();
                match ev {
                    Event::Send => {
                        clock.on_send(owner);
                    }
                    Event::Receive(entries) => {
                        clock.observe(owner, &VectorClock::from_entries(entries)).unwrap();
                    }
                }

                prop_assert!(clock.get(owner) > before.get(owner));
                for i in 0..4u32 {
                    prop_assert!(clock.get(NodeId(i)) >= before.get(NodeId(i)));
                }
            }
        }
    }
}
