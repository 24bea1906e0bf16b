//! Persistence of verified snapshots.
//!
//! After each completed round the initiator appends every recorded vector clock to that
//! node's output, one space separated line per round.

use cutline_core::{NodeId, VectorClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Failure to persist a snapshot line
#[derive(Debug, thiserror::Error)]
#[error("failed to write results to {path}: {source}")]
pub struct ResultWriteError {
    /// Destination file
    pub path: PathBuf,
    /// Underlying I/O error
    #[source]
    pub source: std::io::Error,
}

/// Sink for per-node snapshot lines.
pub trait ResultWriter: Send + Sync {
    /// Append `clock` as recorded by `node`
    fn append(&self, node: NodeId, clock: &VectorClock) -> Result<(), ResultWriteError>;
}

/// Writes `<dir>/<stem>-<node>.out`, appending one line per round.
#[derive(Debug)]
pub struct FileResultWriter {
    dir: PathBuf,
    stem: String,
    lock: Mutex<()>,
}

impl FileResultWriter {
    /// Writer rooted at `dir`; the directory is created if missing
    pub fn create(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Result<Self, ResultWriteError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ResultWriteError {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            stem: stem.into(),
            lock: Mutex::new(()),
        })
    }

    /// Output file for `node`
    pub fn path_for(&self, node: NodeId) -> PathBuf {
        self.dir.join(format!("{}-{node}.out", self.stem))
    }

    /// Directory holding the output files
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultWriter for FileResultWriter {
    fn append(&self, node: NodeId, clock: &VectorClock) -> Result<(), ResultWriteError> {
        let path = self.path_for(node);
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ResultWriteError {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{clock}").map_err(|source| ResultWriteError { path, source })
    }
}

/// Keeps lines in memory, for tests and the in-process simulation.
#[derive(Debug, Default)]
pub struct MemoryResultWriter {
    lines: Mutex<HashMap<NodeId, Vec<String>>>,
}

impl MemoryResultWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines appended for `node` so far
    pub fn lines(&self, node: NodeId) -> Vec<String> {
        self.lines.lock().get(&node).cloned().unwrap_or_default()
    }
}

impl ResultWriter for MemoryResultWriter {
    fn append(&self, node: NodeId, clock: &VectorClock) -> Result<(), ResultWriteError> {
        self.lines
            .lock()
            .entry(node)
            .or_default()
            .push(clock.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writer_appends_lines_per_node() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileResultWriter::create(dir.path().join("out"), "ring").unwrap();

        writer
            .append(NodeId(1), &VectorClock::from_entries(vec![0, 3, 1]))
            .unwrap();
        writer
            .append(NodeId(1), &VectorClock::from_entries(vec![2, 5, 1]))
            .unwrap();
        writer
            .append(NodeId(0), &VectorClock::from_entries(vec![1, 0, 0]))
            .unwrap();

        let node1 = std::fs::read_to_string(writer.path_for(NodeId(1))).unwrap();
        assert_eq!(node1, "0 3 1\n2 5 1\n");
        assert!(writer.path_for(NodeId(0)).ends_with("ring-0.out"));
    }

    #[test]
    fn test_memory_writer_collects_lines() {
        let writer = MemoryResultWriter::new();
        writer.append(NodeId(2), &VectorClock::new(2)).unwrap();
        assert_eq!(writer.lines(NodeId(2)), vec!["0 0".to_string()]);
        assert!(writer.lines(NodeId(0)).is_empty());
    }
}
