//! In-process simulation: every node of a topology on one runtime over the memory transport.

use crate::aggregator::RoundOutcome;
use crate::bootstrap::BootstrapOptions;
use crate::results::ResultWriter;
use crate::runtime::{Node, NodeSummary};
use crate::NodeError;
use cutline_core::Config;
use cutline_transport::MemoryTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Result of a finished simulation.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Every completed round in order; the last one is quiescent
    pub rounds: Vec<RoundOutcome>,
    /// Per-node counters sorted by id
    pub nodes: Vec<NodeSummary>,
}

impl SimulationReport {
    /// True if every round passed the consistency check
    pub fn all_consistent(&self) -> bool {
        self.rounds.iter().all(|r| r.consistency.is_consistent())
    }
}

/// Runs a whole topology until the initiator detects termination.
pub struct Simulation {
    config: Arc<Config>,
    transport: MemoryTransport,
    results: Option<Arc<dyn ResultWriter>>,
}

impl Simulation {
    /// Simulation of `config`
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            transport: MemoryTransport::new(),
            results: None,
        }
    }

    /// Persist completed rounds through `writer`
    pub fn with_result_writer(mut self, writer: Arc<dyn ResultWriter>) -> Self {
        self.results = Some(writer);
        self
    }

    /// Start every node and wait for all of them to finish.
    ///
    /// The first node failure aborts the remaining nodes and is returned.
    pub async fn run(self) -> Result<SimulationReport, NodeError> {
        let initiator = self.config.parameters.initiator;
        let bootstrap = BootstrapOptions {
            connect_attempts: 200,
            retry_delay: Duration::from_millis(5),
        };
        let (outcomes_tx, mut outcomes_rx) = mpsc::unbounded_channel();

        let mut nodes = JoinSet::new();
        for entry in self.config.nodes() {
            let mut node = Node::new(entry.id, self.config.clone(), self.transport.clone())
                .with_bootstrap(bootstrap);
            if entry.id == initiator {
                node = node.with_outcome_sink(outcomes_tx.clone());
                if let Some(writer) = &self.results {
                    node = node.with_result_writer(writer.clone());
                }
            }
            nodes.spawn(node.run());
        }
        drop(outcomes_tx);
        tracing::info!(
            name = %self.config.name,
            nodes = self.config.node_count(),
            "simulation started"
        );

        let mut summaries = Vec::with_capacity(self.config.node_count());
        while let Some(joined) = nodes.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(NodeError::Task(e.to_string())));
            match result {
                Ok(summary) => summaries.push(summary),
                Err(error) => {
                    nodes.abort_all();
                    return Err(error);
                }
            }
        }
        summaries.sort_by_key(|s| s.node);

        let mut rounds = Vec::new();
        while let Ok(outcome) = outcomes_rx.try_recv() {
            rounds.push(outcome);
        }
        tracing::info!(rounds = rounds.len(), "simulation finished");
        Ok(SimulationReport {
            rounds,
            nodes: summaries,
        })
    }
}
