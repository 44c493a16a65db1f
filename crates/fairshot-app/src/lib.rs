// Pipeline stages: ingestion, model fitting and scoring, projection.
//
// Every stage reads its inputs from disk and persists its output through
// an atomic rename, so stages can be re-run independently.

pub mod cache;
pub mod error;
pub mod fit;
pub mod ingest;
pub mod project;

pub use cache::ScoredCache;
pub use error::{IngestError, PipelineError};
pub use fit::{fit, score, FitReport, ScoreReport};
pub use ingest::{prepare, IngestSummary};
pub use project::project;

use std::io::ErrorKind;
use std::path::PathBuf;

use fairshot_basketball::profile::Projection;
use fairshot_core::config::Config;
use tracing::{info, warn};

/// Outcome of a full pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    pub fit: FitReport,
    pub projection: Projection,
}

/// Run all three stages in order. A failing stage stops the run, so later
/// stages never consume stale output.
pub fn run_all(config: &Config) -> Result<RunSummary, PipelineError> {
    let ingest = prepare(config)?;
    let fit = fit(config)?;
    let mut cache = ScoredCache::new();
    let projection = project(config, &mut cache)?;
    info!(
        "pipeline complete: {} players scored, {} projected",
        fit.players,
        projection.players.len()
    );
    Ok(RunSummary {
        ingest,
        fit,
        projection,
    })
}

/// Remove the outputs of a failed stage. Missing files are fine; other
/// removal errors are logged and otherwise ignored so the original stage
/// error is the one reported.
pub(crate) fn discard_outputs(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => warn!("removed stale {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove stale {}: {}", path.display(), e),
        }
    }
}
