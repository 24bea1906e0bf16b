//! Topology validation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Parse, validate and print a topology
#[derive(Args)]
pub struct CheckConfigCommand {
    /// Topology file (text format, or TOML by extension)
    #[arg(short, long)]
    pub config: PathBuf,
}

/// Handle check-config command execution
pub fn handle_check_config(cmd: CheckConfigCommand) -> Result<()> {
    let config = super::load_config(&cmd.config)?;
    let p = &config.parameters;

    println!("topology {}: {} nodes", config.name, config.node_count());
    println!(
        "  per activation {}..={}, send delay {:?}, snapshot delay {:?}, budget {}",
        p.min_per_active, p.max_per_active, p.min_send_delay, p.snapshot_delay, p.max_number
    );
    println!(
        "  initiator {}, start node {}, rule {:?}",
        p.initiator, p.start_node, p.consistency_rule
    );
    for node in config.nodes() {
        let neighbors: Vec<String> = node.neighbors.iter().map(ToString::to_string).collect();
        println!("  {} {} -> [{}]", node.id, node.address(), neighbors.join(", "));
    }
    Ok(())
}
