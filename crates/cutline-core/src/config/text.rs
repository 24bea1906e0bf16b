//! Whitespace separated lab configuration format.
//!
//! ```text
//! # nodes minPerActive maxPerActive minSendDelay snapshotDelay maxNumber
//! 3 1 4 20 200 15
//! 0 dc01 1234
//! 1 dc02 1233
//! 2 dc03 1232
//! 1 2      # neighbors of node 0
//! 0 2      # neighbors of node 1
//! 0 1      # neighbors of node 2
//! ```
//!
//! Parameter and node lines are the lines whose first token is an unsigned integer; everything
//! after a `#` is a comment. Neighbor lines follow positionally, and a blank one means the node
//! lists no neighbors of its own. Delays are in milliseconds.

use super::{Config, NodeConfig, RunParameters};
use crate::errors::ConfigError;
use crate::identifiers::NodeId;
use std::str::FromStr;
use std::time::Duration;

/// Parse a text topology named `name`
pub fn parse(name: &str, content: &str) -> Result<Config, ConfigError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line));
    let mut valid = lines
        .by_ref()
        .map(|(line_no, line)| (line_no, strip_comment(line)))
        .filter(|(_, line)| starts_with_integer(line));

    let (line_no, header) = valid
        .next()
        .ok_or_else(|| ConfigError::parse(0, "missing parameter line"))?;
    let header: Vec<&str> = header.split_whitespace().collect();
    if header.len() < 6 {
        return Err(ConfigError::parse(
            line_no,
            format!("expected 6 parameters, found {}", header.len()),
        ));
    }

    let nodes: usize = field(line_no, header[0], "node count")?;
    let parameters = RunParameters::new(
        nodes,
        field(line_no, header[1], "minPerActive")?,
        field(line_no, header[2], "maxPerActive")?,
        Duration::from_millis(field(line_no, header[3], "minSendDelay")?),
        Duration::from_millis(field(line_no, header[4], "snapshotDelay")?),
        field(line_no, header[5], "maxNumber")?,
    );

    let mut entries = Vec::with_capacity(nodes);
    for _ in 0..nodes {
        let (line_no, line) = valid
            .next()
            .ok_or_else(|| ConfigError::parse(0, format!("expected {nodes} node lines")))?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(ConfigError::parse(line_no, "expected `id host port`"));
        }
        entries.push(NodeConfig::new(
            NodeId(field(line_no, tokens[0], "node id")?),
            tokens[1],
            field(line_no, tokens[2], "port")?,
        ));
    }

    for (index, (line_no, line)) in neighbor_lines(lines, nodes)?.into_iter().enumerate() {
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id.index() == index)
            .ok_or_else(|| ConfigError::parse(line_no, format!("no node line for id {index}")))?;
        for token in line.split_whitespace() {
            entry
                .neighbors
                .insert(NodeId(field(line_no, token, "neighbor id")?));
        }
    }

    Config::new(name, parameters, entries)
}

/// Neighbor lines are positional: the k-th line belongs to node k.
///
/// A blank line is a node without listed neighbors. Comment-only and non-numeric lines are
/// skipped. Blank separators around the block are dropped while more than `nodes` lines remain,
/// and lines missing at the end of the file mean no neighbors.
fn neighbor_lines<'a>(
    lines: impl Iterator<Item = (usize, &'a str)>,
    nodes: usize,
) -> Result<Vec<(usize, &'a str)>, ConfigError> {
    let mut block: Vec<(usize, &str)> = lines
        .filter(|(_, raw)| !raw.trim_start().starts_with('#'))
        .map(|(line_no, raw)| (line_no, strip_comment(raw)))
        .filter(|(_, line)| line.trim().is_empty() || starts_with_integer(line))
        .collect();

    while block.len() > nodes && block.last().is_some_and(|(_, line)| line.trim().is_empty()) {
        block.pop();
    }
    let leading = block
        .iter()
        .take_while(|(_, line)| line.trim().is_empty())
        .count()
        .min(block.len().saturating_sub(nodes));
    block.drain(..leading);

    if block.len() > nodes {
        let (line_no, _) = block[nodes];
        return Err(ConfigError::parse(
            line_no,
            format!("expected {nodes} neighbor lines, found {}", block.len()),
        ));
    }
    Ok(block)
}

fn starts_with_integer(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.parse::<u64>().is_ok())
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    }
}

fn field<T: FromStr>(line: usize, token: &str, what: &str) -> Result<T, ConfigError> {
    token
        .parse()
        .map_err(|_| ConfigError::parse(line, format!("invalid {what} `{token}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const RING: &str = "\
# three node ring
3 1 4 20 200 15

0 dc01 1234
1 dc02 1233   # trailing comment
2 dc03 1232
this line is ignored
1 2
0 2
0 1
";

    #[test]
    fn test_parses_lab_format() {
        let config = parse("ring", RING).unwrap();
        assert_eq!(config.name, "ring");
        assert_eq!(config.node_count(), 3);

        let p = &config.parameters;
        assert_eq!((p.min_per_active, p.max_per_active), (1, 4));
        assert_eq!(p.min_send_delay, Duration::from_millis(20));
        assert_eq!(p.snapshot_delay, Duration::from_millis(200));
        assert_eq!(p.max_number, 15);
        assert_eq!(p.activation_delay, p.min_send_delay);

        let node1 = config.node(NodeId(1)).unwrap();
        assert_eq!(node1.address(), "dc02:1233");
        assert_eq!(
            node1.neighbors.iter().copied().collect::<Vec<_>>(),
            vec![NodeId(0), NodeId(2)]
        );
    }

    #[test]
    fn test_single_isolated_node() {
        let config = parse("t", "1 1 2 10 100 5\n0 a 1\n\n").unwrap();
        assert_eq!(config.node_count(), 1);
        assert!(config.neighbors(NodeId(0)).is_empty());

        // Missing neighbor line at end of file
        let config = parse("t", "1 1 2 10 100 5\n0 a 1\n").unwrap();
        assert!(config.neighbors(NodeId(0)).is_empty());
    }

    #[test]
    fn test_blank_neighbor_line_keeps_positions() {
        let star = "\
3 1 2 10 100 5
0 a 1
1 b 2
2 c 3

1 2
   # node 1 only gets edges from the others

0
";
        let config = parse("star", star).unwrap();
        let neighbors = |id| config.neighbors(NodeId(id)).iter().copied().collect::<Vec<_>>();
        assert_eq!(neighbors(0), vec![NodeId(1), NodeId(2)]);
        assert_eq!(neighbors(1), vec![NodeId(0)]);
        assert_eq!(neighbors(2), vec![NodeId(0)]);
    }

    #[test]
    fn test_reports_surplus_neighbor_lines() {
        let surplus = "2 1 2 10 100 5\n0 a 1\n1 b 2\n1\n0\n1\n";
        let err = parse("t", surplus).unwrap_err();
        assert_matches!(err, ConfigError::Parse { line: 6, .. });
    }

    #[test]
    fn test_reports_bad_token_with_line_number() {
        let bad = "2 1 2 10 100 5\n0 a 1\n1 b port\n1\n0\n";
        let err = parse("t", bad).unwrap_err();
        assert_matches!(err, ConfigError::Parse { line: 3, .. });
    }
}
