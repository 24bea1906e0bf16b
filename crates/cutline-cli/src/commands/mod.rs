//! Subcommand handlers

pub mod check_config;
pub mod node;
pub mod simulate;

use anyhow::{Context, Result};
use cutline_core::Config;
use cutline_node::FileResultWriter;
use std::path::Path;
use std::sync::Arc;

/// Load and validate the topology at `path`
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("loading topology {}", path.display()))
}

/// Result writer named after the topology, rooted at `dir`
pub fn result_writer(dir: &Path, config: &Config) -> Result<Arc<FileResultWriter>> {
    let writer = FileResultWriter::create(dir, config.name.clone())
        .with_context(|| format!("preparing output directory {}", dir.display()))?;
    Ok(Arc::new(writer))
}
