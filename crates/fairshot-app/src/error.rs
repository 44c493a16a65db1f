// Error types for the pipeline stages.

use std::path::PathBuf;

use fairshot_core::table::TableError;
use fairshot_model::ModelError;
use thiserror::Error;

/// Stage 1 failures. Nothing is written when any of these occur.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("no player in {stats} has a salary in {salaries}")]
    NoMatches { stats: PathBuf, salaries: PathBuf },
}

/// Failures of the fit, score and projection stages, which each validate
/// their own inputs at entry.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("{path} not found; run `fairshot {stage}` first")]
    MissingArtifact { path: PathBuf, stage: &'static str },

    #[error("{path} is missing feature columns: {}", .columns.join(", "))]
    MissingFeatures { path: PathBuf, columns: Vec<String> },

    #[error("{path} contains no players")]
    EmptyTable { path: PathBuf },

    #[error("{path} has no predictions; run `fairshot fit` first")]
    NotScored { path: PathBuf },
}
