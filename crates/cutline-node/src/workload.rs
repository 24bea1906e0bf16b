//! Randomized application traffic.
//!
//! A passive node with budget left becomes active when the start node boots or when an
//! application message arrives. On activation it draws a burst size in
//! `[min_per_active, max_per_active]` (capped by the remaining budget) and sends the burst to
//! uniformly chosen neighbors, one message per tick. When the burst or the budget runs out
//! the node turns passive again.

use crate::engine::SnapshotEngine;
use cutline_core::{ActivityState, Message, NodeId, RunParameters};
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

/// Per-node workload generator.
#[derive(Debug, Clone)]
pub struct Workload {
    min_per_active: u32,
    max_per_active: u32,
    remaining: u64,
    burst: u32,
    neighbors: BTreeSet<NodeId>,
    rng: ChaCha8Rng,
    sent: u64,
}

impl Workload {
    /// Generator for `node`; seeded runs mix the node id into the seed
    pub fn new(node: NodeId, parameters: &RunParameters, neighbors: BTreeSet<NodeId>) -> Self {
        let rng = match parameters.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(
                seed.wrapping_add(u64::from(node.0).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            ),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            min_per_active: parameters.min_per_active,
            max_per_active: parameters.max_per_active,
            remaining: parameters.max_number,
            burst: 0,
            neighbors,
            rng,
            sent: 0,
        }
    }

    /// Budget left for the rest of the run
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Messages left in the current burst
    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Application messages sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Activate a passive node with budget left; returns true if it became active.
    pub fn try_activate(&mut self, engine: &mut SnapshotEngine) -> bool {
        if engine.activity() == ActivityState::Active || self.remaining == 0 {
            return false;
        }
        let drawn = self.rng.gen_range(self.min_per_active..=self.max_per_active);
        let capped = u64::from(drawn).min(self.remaining);
        self.burst = u32::try_from(capped).unwrap_or(drawn);
        if self.burst == 0 || self.neighbors.is_empty() {
            self.burst = 0;
            return false;
        }
        engine.set_activity(ActivityState::Active);
        tracing::trace!(node = %engine.id(), burst = self.burst, "activated");
        true
    }

    /// Next send of the current burst, ticking the engine's clock.
    ///
    /// The node stays active until the call after its last send, so the delay following that
    /// send still counts as part of the burst. Returns `None`, and leaves the node passive, once
    /// the burst or the budget is exhausted.
    pub fn next_message(&mut self, engine: &mut SnapshotEngine) -> Option<(NodeId, Message)> {
        if engine.activity() != ActivityState::Active {
            return None;
        }
        if self.burst == 0 || self.remaining == 0 {
            self.deactivate(engine);
            return None;
        }
        let Some(to) = self.neighbors.iter().copied().choose(&mut self.rng) else {
            self.deactivate(engine);
            return None;
        };

        let message = engine.prepare_application();
        self.burst -= 1;
        self.remaining -= 1;
        self.sent += 1;
        Some((to, message))
    }

    fn deactivate(&mut self, engine: &mut SnapshotEngine) {
        self.burst = 0;
        engine.set_activity(ActivityState::Passive);
        tracing::trace!(node = %engine.id(), remaining = self.remaining, "passive");
    }
}
