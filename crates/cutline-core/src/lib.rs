//! Cutline Core
//!
//! Shared data model for the snapshot simulator:
//!
//! - [`NodeId`] and the Fidge–Mattern [`VectorClock`]
//! - cut records ([`LocalState`], [`ChannelState`]) and the initiator's [`GlobalState`]
//! - the wire-level [`Message`] sum type exchanged between peers
//! - the post-hoc [`consistency`] verifier
//! - static topology and run parameter [`config`]
//!
//! Nothing in this crate performs I/O other than reading configuration files; the
//! protocol state machine lives in `cutline-node` and the channels in `cutline-transport`.

pub mod clock;
pub mod config;
pub mod consistency;
pub mod errors;
pub mod identifiers;
pub mod messages;
pub mod state;

pub use clock::VectorClock;
pub use config::{Config, NodeConfig, RunParameters};
pub use consistency::{is_consistent, verify, ConsistencyReport, ConsistencyRule, OrderingViolation};
pub use errors::{ConfigError, ProtocolViolation};
pub use identifiers::NodeId;
pub use messages::{Message, SnapshotReport};
pub use state::{ActivityState, ChannelState, GlobalState, LocalState, MarkerMode};
