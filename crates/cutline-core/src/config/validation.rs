//! Topology validation shared by both file formats.

use super::{NodeConfig, RunParameters};
use crate::errors::ConfigError;
use crate::identifiers::NodeId;
use std::collections::{BTreeSet, VecDeque};

/// Check `nodes` against `parameters`, returning entries sorted by id with a symmetric
/// neighbor relation.
pub fn validate(
    parameters: &RunParameters,
    mut nodes: Vec<NodeConfig>,
) -> Result<Vec<NodeConfig>, ConfigError> {
    let n = parameters.nodes;
    if n == 0 {
        return Err(ConfigError::invalid("node count must be at least 1"));
    }
    if nodes.len() != n {
        return Err(ConfigError::invalid(format!(
            "node count is {n} but {} nodes are described",
            nodes.len()
        )));
    }
    if parameters.min_per_active > parameters.max_per_active {
        return Err(ConfigError::invalid(format!(
            "min_per_active ({}) exceeds max_per_active ({})",
            parameters.min_per_active, parameters.max_per_active
        )));
    }

    nodes.sort_by_key(|node| node.id);
    for (index, node) in nodes.iter().enumerate() {
        if node.id.index() != index {
            return Err(ConfigError::invalid(format!(
                "node ids must be exactly 0..{n}, found {} at position {index}",
                node.id
            )));
        }
    }

    for role in [("initiator", parameters.initiator), ("start_node", parameters.start_node)] {
        if role.1.index() >= n {
            return Err(ConfigError::invalid(format!(
                "{} {} is not a node",
                role.0, role.1
            )));
        }
    }

    let mut edges = Vec::new();
    for node in &nodes {
        for neighbor in &node.neighbors {
            if *neighbor == node.id {
                return Err(ConfigError::invalid(format!(
                    "node {} lists itself as a neighbor",
                    node.id
                )));
            }
            if neighbor.index() >= n {
                return Err(ConfigError::invalid(format!(
                    "node {} lists unknown neighbor {neighbor}",
                    node.id
                )));
            }
            edges.push((node.id, *neighbor));
        }
    }

    // Channels are bidirectional.
    for (from, to) in edges {
        if nodes[to.index()].neighbors.insert(from) {
            tracing::debug!(node = %to, neighbor = %from, "symmetrized neighbor list");
        }
    }

    ensure_connected(parameters.initiator, &nodes)?;
    Ok(nodes)
}

/// Every node must be reachable from the initiator, otherwise no round can complete.
fn ensure_connected(initiator: NodeId, nodes: &[NodeConfig]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::from([initiator]);
    let mut queue = VecDeque::from([initiator]);
    while let Some(current) = queue.pop_front() {
        for neighbor in &nodes[current.index()].neighbors {
            if seen.insert(*neighbor) {
                queue.push_back(*neighbor);
            }
        }
    }

    if seen.len() == nodes.len() {
        Ok(())
    } else {
        let unreachable: Vec<String> = nodes
            .iter()
            .filter(|node| !seen.contains(&node.id))
            .map(|node| node.id.to_string())
            .collect();
        Err(ConfigError::invalid(format!(
            "nodes {} are unreachable from initiator {initiator}",
            unreachable.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn parameters(nodes: usize) -> RunParameters {
        RunParameters::new(
            nodes,
            1,
            3,
            Duration::from_millis(5),
            Duration::from_millis(50),
            10,
        )
    }

    fn node(id: u32, neighbors: &[u32]) -> NodeConfig {
        let mut node = NodeConfig::new(NodeId(id), "localhost", 9000 + id as u16);
        node.neighbors = neighbors.iter().copied().map(NodeId).collect();
        node
    }

    #[test]
    fn test_one_sided_edges_are_symmetrized() {
        let nodes = validate(&parameters(3), vec![node(2, &[]), node(0, &[1]), node(1, &[2])]).unwrap();
        assert_eq!(nodes[0].id, NodeId(0));
        assert!(nodes[1].neighbors.contains(&NodeId(0)));
        assert!(nodes[2].neighbors.contains(&NodeId(1)));
    }

    #[test]
    fn test_rejects_gapped_ids() {
        let err = validate(&parameters(2), vec![node(0, &[2]), node(2, &[0])]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid(_));
    }

    #[test]
    fn test_rejects_self_loop_and_unknown_neighbor() {
        assert!(validate(&parameters(2), vec![node(0, &[0, 1]), node(1, &[])]).is_err());
        assert!(validate(&parameters(2), vec![node(0, &[1, 7]), node(1, &[])]).is_err());
    }

    #[test]
    fn test_rejects_disconnected_topology() {
        let err = validate(
            &parameters(4),
            vec![node(0, &[1]), node(1, &[0]), node(2, &[3]), node(3, &[2])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn test_rejects_inverted_activation_range() {
        let mut params = parameters(1);
        params.min_per_active = 5;
        params.max_per_active = 2;
        assert!(validate(&params, vec![node(0, &[])]).is_err());
    }

    #[test]
    fn test_single_isolated_node_is_valid() {
        assert!(validate(&parameters(1), vec![node(0, &[])]).is_ok());
    }
}
