//! Static topology and run parameters.
//!
//! A [`Config`] is loaded once at bootstrap and handed to every node explicitly. Two file
//! formats are understood:
//!
//! - the whitespace separated lab format (see [`text`]), and
//! - a TOML document for anything ending in `.toml` (see [`manifest`]).
//!
//! Both go through the same [`validation`] pass, which also symmetrizes the neighbor
//! relation since every channel is bidirectional.

pub mod manifest;
pub mod text;
pub mod validation;

use crate::consistency::ConsistencyRule;
use crate::errors::ConfigError;
use crate::identifiers::NodeId;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Workload and snapshot tuning shared by all nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    /// Number of nodes in the topology
    pub nodes: usize,
    /// Fewest application messages sent per activation
    pub min_per_active: u32,
    /// Most application messages sent per activation
    pub max_per_active: u32,
    /// Delay between consecutive sends of one activation
    pub min_send_delay: Duration,
    /// Delay between the end of one snapshot round and the start of the next
    pub snapshot_delay: Duration,
    /// Application messages each node may send over the whole run
    pub max_number: u64,
    /// Node that initiates snapshots and aggregates reports
    pub initiator: NodeId,
    /// Node activated once at startup
    pub start_node: NodeId,
    /// Delay between activation and the first send of a burst
    pub activation_delay: Duration,
    /// Seed for reproducible workloads
    pub seed: Option<u64>,
    /// Predicate used to verify completed snapshots
    pub consistency_rule: ConsistencyRule,
}

impl RunParameters {
    /// Parameters with the given six core values and defaults for everything else
    pub fn new(
        nodes: usize,
        min_per_active: u32,
        max_per_active: u32,
        min_send_delay: Duration,
        snapshot_delay: Duration,
        max_number: u64,
    ) -> Self {
        Self {
            nodes,
            min_per_active,
            max_per_active,
            min_send_delay,
            snapshot_delay,
            max_number,
            initiator: NodeId(0),
            start_node: NodeId(0),
            activation_delay: min_send_delay,
            seed: None,
            consistency_rule: ConsistencyRule::default(),
        }
    }
}

/// Addressing and adjacency of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Node id
    pub id: NodeId,
    /// Host name or IP the node listens on
    pub host: String,
    /// Listening port
    pub port: u16,
    /// Neighbor ids
    pub neighbors: BTreeSet<NodeId>,
}

impl NodeConfig {
    /// Node entry without neighbors
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            neighbors: BTreeSet::new(),
        }
    }

    /// `host:port` form used by transports
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Validated topology plus run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run name, used to key per-node output files
    pub name: String,
    /// Shared tuning
    pub parameters: RunParameters,
    /// Node entries indexed by id
    nodes: Vec<NodeConfig>,
}

impl Config {
    /// Validate `nodes` against `parameters` and build a config
    pub fn new(
        name: impl Into<String>,
        parameters: RunParameters,
        nodes: Vec<NodeConfig>,
    ) -> Result<Self, ConfigError> {
        let nodes = validation::validate(&parameters, nodes)?;
        Ok(Self {
            name: name.into(),
            parameters,
            nodes,
        })
    }

    /// Load from disk, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cutline".to_string());

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let config = if is_toml {
            manifest::parse(&name, &content)?
        } else {
            text::parse(&name, &content)?
        };

        tracing::debug!(
            path = %path.display(),
            nodes = config.node_count(),
            "loaded topology"
        );
        Ok(config)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Entry for `id`
    pub fn node(&self, id: NodeId) -> Option<&NodeConfig> {
        self.nodes.get(id.index())
    }

    /// All entries in id order
    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    /// Neighbors of `id`, empty for unknown ids
    pub fn neighbors(&self, id: NodeId) -> BTreeSet<NodeId> {
        self.node(id)
            .map(|n| n.neighbors.clone())
            .unwrap_or_default()
    }
}
