//! Node identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a peer process.
///
/// Ids are dense (`0..N`) so they double as vector clock indices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a node id from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Position of this node inside a vector clock
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
