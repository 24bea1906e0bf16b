//! TOML topology format.
//!
//! ```toml
//! [parameters]
//! nodes = 3
//! min_per_active = 1
//! max_per_active = 4
//! min_send_delay_ms = 20
//! snapshot_delay_ms = 200
//! max_number = 15
//! # optional
//! initiator = 0
//! start_node = 0
//! activation_delay_ms = 20
//! seed = 7
//! consistency_rule = "causal"
//!
//! [[nodes]]
//! id = 0
//! host = "127.0.0.1"
//! port = 9000
//! neighbors = [1, 2]
//! ```

use super::{Config, NodeConfig, RunParameters};
use crate::consistency::ConsistencyRule;
use crate::errors::ConfigError;
use crate::identifiers::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// On-disk shape of a TOML topology
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Run parameters
    pub parameters: ParametersSection,
    /// Node entries
    #[serde(default)]
    pub nodes: Vec<NodeSection>,
}

/// `[parameters]` table, delays in milliseconds
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersSection {
    pub nodes: usize,
    pub min_per_active: u32,
    pub max_per_active: u32,
    pub min_send_delay_ms: u64,
    pub snapshot_delay_ms: u64,
    pub max_number: u64,
    #[serde(default)]
    pub initiator: Option<NodeId>,
    #[serde(default)]
    pub start_node: Option<NodeId>,
    #[serde(default)]
    pub activation_delay_ms: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub consistency_rule: Option<ConsistencyRule>,
}

/// `[[nodes]]` entry
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub neighbors: Vec<NodeId>,
}

impl From<ParametersSection> for RunParameters {
    fn from(section: ParametersSection) -> Self {
        let mut parameters = RunParameters::new(
            section.nodes,
            section.min_per_active,
            section.max_per_active,
            Duration::from_millis(section.min_send_delay_ms),
            Duration::from_millis(section.snapshot_delay_ms),
            section.max_number,
        );
        if let Some(initiator) = section.initiator {
            parameters.initiator = initiator;
        }
        if let Some(start_node) = section.start_node {
            parameters.start_node = start_node;
        }
        if let Some(ms) = section.activation_delay_ms {
            parameters.activation_delay = Duration::from_millis(ms);
        }
        parameters.seed = section.seed;
        parameters.consistency_rule = section.consistency_rule.unwrap_or_default();
        parameters
    }
}

/// Parse a TOML topology named `name`
pub fn parse(name: &str, content: &str) -> Result<Config, ConfigError> {
    let manifest: Manifest = toml::from_str(content)?;
    let nodes = manifest
        .nodes
        .into_iter()
        .map(|section| NodeConfig {
            id: section.id,
            host: section.host,
            port: section.port,
            neighbors: section.neighbors.into_iter().collect(),
        })
        .collect();
    Config::new(name, manifest.parameters.into(), nodes)
}
