// Seeded random-forest regression used to estimate salaries from box-score
// statistics.

pub mod forest;
pub mod metrics;
pub mod tree;

pub use forest::{ForestParams, RandomForest};
pub use metrics::{evaluate, Evaluation};

use std::path::PathBuf;

use thiserror::Error;

/// Errors from fitting, applying or (de)serializing a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    #[error("{rows} feature rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("expected {expected} features, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("training data contains NaN or infinite values")]
    NonFiniteInput,

    #[error("invalid model parameters: {0}")]
    InvalidParams(String),

    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("model artifact is corrupt: {0}")]
    CorruptArtifact(String),

    #[error("model artifact is not valid: {0}")]
    Serialize(#[source] serde_json::Error),
}
