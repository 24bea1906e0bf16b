//! Cutline Node
//!
//! The per-process side of the simulator: the Chandy–Lamport [`SnapshotEngine`], the
//! randomized [`Workload`], initiator-side aggregation and result persistence, and the async
//! [`Node`] runtime that wires them to neighbor channels.
//!
//! ```rust,ignore
//! use cutline_node::Simulation;
//!
//! let config = cutline_core::Config::load("ring.toml".as_ref())?;
//! let report = Simulation::new(config).run().await?;
//! assert!(report.all_consistent());
//! ```

pub mod aggregator;
pub mod bootstrap;
pub mod engine;
pub mod error;
pub mod results;
pub mod runtime;
pub mod simulation;
pub mod workload;

pub use aggregator::{GlobalStateAggregator, RoundOutcome};
pub use bootstrap::BootstrapOptions;
pub use engine::{Action, SnapshotEngine};
pub use error::NodeError;
pub use results::{FileResultWriter, MemoryResultWriter, ResultWriteError, ResultWriter};
pub use runtime::{Node, NodeSummary};
pub use simulation::{Simulation, SimulationReport};
pub use workload::Workload;
