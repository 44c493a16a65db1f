// Stage 2: fit the salary model on the canonical table and score every
// player, or re-score with a previously persisted model.

use std::path::{Path, PathBuf};

use fairshot_basketball::canonical::{CanonicalTable, PlayerRecord};
use fairshot_basketball::stats::{StatColumn, FEATURES};
use fairshot_core::config::{Config, ModelConfig};
use fairshot_core::table::{write_atomic, SniffedSource};
use fairshot_model::{evaluate, Evaluation, ForestParams, RandomForest};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::discard_outputs;
use crate::error::PipelineError;

/// Outcome of a fit run.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub players: usize,
    pub training_rows: usize,
    /// In-sample error on the rows the model was fitted on.
    pub training: Option<Evaluation>,
    /// Error on the held-out rows, when a validation fraction is configured.
    pub validation: Option<Evaluation>,
    /// Normalized importance of each feature, in feature order.
    pub importances: Vec<(StatColumn, f64)>,
    pub scored_table: PathBuf,
    pub model_artifact: PathBuf,
}

/// Outcome of re-scoring with a saved model.
#[derive(Debug, Clone)]
pub struct ScoreReport {
    pub players: usize,
    pub evaluation: Option<Evaluation>,
    pub scored_table: PathBuf,
}

pub fn forest_params(model: &ModelConfig) -> ForestParams {
    ForestParams {
        n_estimators: model.n_estimators,
        seed: model.seed,
        max_depth: model.max_depth,
        min_samples_split: model.min_samples_split,
        min_samples_leaf: model.min_samples_leaf,
        max_features: model.max_features,
        bootstrap: true,
    }
}

/// Feature rows in [`FEATURES`] order with missing values imputed as 0.
pub fn feature_matrix(players: &[PlayerRecord]) -> Vec<Vec<f64>> {
    players.iter().map(|p| p.stats.feature_vector()).collect()
}

/// Load the canonical table for modeling, failing fast when it is absent,
/// empty, or lacks any feature column.
pub fn load_model_input(path: &Path) -> Result<CanonicalTable, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: path.to_path_buf(),
            stage: "prepare",
        });
    }
    let table = CanonicalTable::read(&SniffedSource::open(path)?)?;
    let missing = table.schema.missing_features();
    if !missing.is_empty() {
        return Err(PipelineError::MissingFeatures {
            path: path.to_path_buf(),
            columns: missing.iter().map(|c| c.label().to_string()).collect(),
        });
    }
    if table.is_empty() {
        return Err(PipelineError::EmptyTable {
            path: path.to_path_buf(),
        });
    }
    Ok(table)
}

/// Split row indices into (training, validation) with a seeded shuffle.
/// At least one row always stays in the training set.
fn holdout_split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let n_holdout = ((fraction * n as f64).round() as usize).min(n.saturating_sub(1));
    if n_holdout == 0 {
        return (indices, Vec::new());
    }
    let mut rng = SmallRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let validation = indices.split_off(n - n_holdout);
    (indices, validation)
}

/// Fit a forest on `table` and attach predictions to every player.
pub fn fit_table(
    table: &mut CanonicalTable,
    model: &ModelConfig,
) -> Result<(RandomForest, Option<Evaluation>, Option<Evaluation>), PipelineError> {
    let x = feature_matrix(&table.players);
    let y: Vec<f64> = table.players.iter().map(|p| p.salary).collect();

    let (train_idx, valid_idx) = holdout_split(x.len(), model.validation_fraction, model.seed);
    let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let train_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

    let forest = RandomForest::fit(&train_x, &train_y, forest_params(model))?;
    let predictions = forest.predict(&x)?;

    let pick = |idx: &[usize], v: &[f64]| -> Vec<f64> { idx.iter().map(|&i| v[i]).collect() };
    let training = evaluate(&train_y, &pick(&train_idx, &predictions));
    let validation = evaluate(&pick(&valid_idx, &y), &pick(&valid_idx, &predictions));

    for (player, predicted) in table.players.iter_mut().zip(predictions) {
        player.attach_prediction(predicted);
    }
    Ok((forest, training, validation))
}

fn log_evaluation(label: &str, evaluation: &Option<Evaluation>) {
    if let Some(e) = evaluation {
        info!(
            "{} error over {} players: MAE {:.0}, RMSE {:.0}, R2 {}",
            label,
            e.n,
            e.mae,
            e.rmse,
            e.r2.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
        );
    }
}

/// Run stage 2: fit, score and persist `predictions.csv` and `model.json`.
///
/// On failure both artifacts are removed rather than left from a previous
/// run or half-replaced.
pub fn fit(config: &Config) -> Result<FitReport, PipelineError> {
    let result = run_fit(config);
    if result.is_err() {
        discard_outputs(&[config.paths.scored_table(), config.paths.model_artifact()]);
    }
    result
}

fn run_fit(config: &Config) -> Result<FitReport, PipelineError> {
    let input = config.paths.canonical_table();
    let mut table = load_model_input(&input)?;
    info!(
        "fitting {} trees on {} players (seed {})",
        config.model.n_estimators,
        table.len(),
        config.model.seed
    );

    let (forest, training, validation) = fit_table(&mut table, &config.model)?;
    log_evaluation("training", &training);
    log_evaluation("validation", &validation);

    let importances: Vec<(StatColumn, f64)> = FEATURES
        .iter()
        .copied()
        .zip(forest.feature_importances())
        .collect();

    let model_artifact = config.paths.model_artifact();
    let scored_table = config.paths.scored_table();
    let model_json = forest.to_json()?;
    table.write_scored(&scored_table)?;
    write_atomic(&model_artifact, &model_json)?;
    info!("wrote {} and {}", scored_table.display(), model_artifact.display());

    Ok(FitReport {
        players: table.len(),
        training_rows: training.map_or(0, |e| e.n),
        training,
        validation,
        importances,
        scored_table,
        model_artifact,
    })
}

/// Re-score the canonical table with the persisted model, without
/// retraining. On failure the scored table is removed; the model is an
/// input here and stays.
pub fn score(config: &Config) -> Result<ScoreReport, PipelineError> {
    let result = run_score(config);
    if result.is_err() {
        discard_outputs(&[config.paths.scored_table()]);
    }
    result
}

fn run_score(config: &Config) -> Result<ScoreReport, PipelineError> {
    let model_path = config.paths.model_artifact();
    if !model_path.exists() {
        return Err(PipelineError::MissingArtifact {
            path: model_path,
            stage: "fit",
        });
    }
    let forest = RandomForest::load(&model_path)?;
    if forest.params().seed != config.model.seed || forest.n_trees() != config.model.n_estimators {
        warn!(
            "{} was fitted with different model settings than the current config",
            model_path.display()
        );
    }

    let input = config.paths.canonical_table();
    let mut table = load_model_input(&input)?;
    let predictions = forest.predict(&feature_matrix(&table.players))?;
    let actual: Vec<f64> = table.players.iter().map(|p| p.salary).collect();
    let evaluation = evaluate(&actual, &predictions);
    for (player, predicted) in table.players.iter_mut().zip(predictions) {
        player.attach_prediction(predicted);
    }
    log_evaluation("scoring", &evaluation);

    let scored_table = config.paths.scored_table();
    table.write_scored(&scored_table)?;
    info!("re-scored {} players into {}", table.len(), scored_table.display());

    Ok(ScoreReport {
        players: table.len(),
        evaluation,
        scored_table,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
