//! Cutline command-line interface
//!
//! Runs one snapshot node per process over TCP, or a whole topology in-process, and validates
//! topology files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    check_config::{handle_check_config, CheckConfigCommand},
    node::{handle_node_command, NodeCommand},
    simulate::{handle_simulate_command, SimulateCommand},
};

#[derive(Parser)]
#[command(name = "cutline")]
#[command(about = "Chandy-Lamport snapshots over vector-clocked workloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single node of the topology over TCP
    Node(NodeCommand),
    /// Run every node of the topology in this process
    Simulate(SimulateCommand),
    /// Parse and validate a topology file
    CheckConfig(CheckConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Node(cmd) => handle_node_command(cmd).await?,
        Commands::Simulate(cmd) => handle_simulate_command(cmd).await?,
        Commands::CheckConfig(cmd) => handle_check_config(cmd)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_node_subcommand() {
        let cli = Cli::try_parse_from([
            "cutline", "-v", "node", "--id", "2", "--config", "ring.txt",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Node(cmd) => {
                assert_eq!(cmd.id, 2);
                assert_eq!(cmd.output_dir, std::path::PathBuf::from("."));
            }
            _ => panic!("expected node subcommand"),
        }
    }

    #[test]
    fn test_parses_check_config_in_kebab_case() {
        let cli = Cli::try_parse_from(["cutline", "check-config", "-c", "ring.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig(_)));
    }

    #[test]
    fn test_node_requires_id() {
        assert!(Cli::try_parse_from(["cutline", "node", "--config", "ring.txt"]).is_err());
    }
}
