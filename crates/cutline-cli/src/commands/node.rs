//! Single node process

use anyhow::{bail, Result};
use clap::Args;
use cutline_core::NodeId;
use cutline_node::Node;
use cutline_transport::TcpTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Run one node over TCP until the initiator broadcasts termination
#[derive(Args)]
pub struct NodeCommand {
    /// Id of this node in the topology
    #[arg(long)]
    pub id: u32,

    /// Topology file (text format, or TOML by extension)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Directory for per-node result files (written by the initiator)
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// Handle node command execution
pub async fn handle_node_command(cmd: NodeCommand) -> Result<()> {
    let config = Arc::new(super::load_config(&cmd.config)?);
    let id = NodeId(cmd.id);
    let Some(entry) = config.node(id) else {
        bail!("node {id} is not part of topology {}", config.name);
    };
    info!(node = %id, address = %entry.address(), "starting node");

    let mut node = Node::new(id, config.clone(), TcpTransport::new());
    if id == config.parameters.initiator {
        let writer = super::result_writer(&cmd.output_dir, &config)?;
        info!(dir = %writer.dir().display(), "writing snapshot results");
        node = node.with_result_writer(writer);
    }

    let summary = node.run().await?;
    info!(
        node = %summary.node,
        sent = summary.messages_sent,
        rounds = summary.rounds_closed,
        "node terminated"
    );
    Ok(())
}
