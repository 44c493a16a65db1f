// Read-through cache of the scored table, keyed by file identity.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fairshot_basketball::canonical::CanonicalTable;
use fairshot_core::table::{SniffedSource, TableError};
use tracing::debug;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileIdentity {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

impl FileIdentity {
    fn of(path: &Path) -> Result<Self, TableError> {
        let meta = std::fs::metadata(path).map_err(|e| TableError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Holds the most recently loaded scored table. A lookup reloads when the
/// path, modification time or length differs from the cached entry.
#[derive(Debug, Default)]
pub struct ScoredCache {
    entry: Option<(FileIdentity, CanonicalTable)>,
    loads: usize,
}

impl ScoredCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<&CanonicalTable, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::MissingArtifact {
                path: path.to_path_buf(),
                stage: "fit",
            });
        }
        let identity = FileIdentity::of(path)?;
        let entry = match self.entry.take() {
            Some((cached, table)) if cached == identity => (cached, table),
            _ => {
                debug!("loading scored table {}", path.display());
                let table = CanonicalTable::read(&SniffedSource::open(path)?)?;
                self.loads += 1;
                (identity, table)
            }
        };
        Ok(&self.entry.insert(entry).1)
    }

    /// Drop the cached table so the next lookup reads from disk.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Number of times a table was read from disk.
    pub fn loads(&self) -> usize {
        self.loads
    }
}
