// Random forest regressor: bootstrap-aggregated CART trees with a fixed
// seed, persisted as an opaque JSON artifact.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tree::{RegressionTree, TreeParams};
use crate::ModelError;

/// Hyperparameters of a forest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features examined per split, in (0, 1].
    pub max_features: f64,
    /// Draw each tree's training rows with replacement.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    fn features_per_split(&self, n_features: usize) -> usize {
        ((self.max_features * n_features as f64).round() as usize).clamp(1, n_features.max(1))
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParams("n_estimators must be greater than 0".into()));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParams("min_samples_split must be at least 2".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParams("min_samples_leaf must be greater than 0".into()));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(ModelError::InvalidParams(format!(
                "max_features must be in (0, 1], got {}",
                self.max_features
            )));
        }
        Ok(())
    }
}

/// A fitted random forest. Prediction is the mean over trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

/// Seed for tree `index`, derived from the forest seed so every tree has
/// its own reproducible stream.
fn tree_seed(seed: u64, index: usize) -> u64 {
    // splitmix64 step
    let mut z = seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl RandomForest {
    /// Fit on rows `x` (all of equal width) and targets `y`.
    ///
    /// Inputs must be finite; callers impute missing values first.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self, ModelError> {
        params.validate()?;
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(ModelError::DimensionMismatch {
                expected: 1,
                found: 0,
            });
        }
        for row in x {
            if row.len() != n_features {
                return Err(ModelError::DimensionMismatch {
                    expected: n_features,
                    found: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFiniteInput);
            }
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteInput);
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.features_per_split(n_features),
        };

        let n = x.len();
        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .map(|t| {
                let mut rng = SmallRng::seed_from_u64(tree_seed(params.seed, t));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, indices, n_features, tree_params, &mut rng)
            })
            .collect();

        debug!(
            "fitted {} trees on {} rows x {} features (mean depth {:.1})",
            trees.len(),
            n,
            n_features,
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64
        );

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predict one row. Not clamped: negative estimates are returned as-is.
    pub fn predict_one(&self, sample: &[f64]) -> Result<f64, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                found: sample.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(sample)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Impurity-based feature importances, normalized to sum to 1 (all
    /// zeros when no tree ever split).
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let tree_total: f64 = tree.importances().iter().sum();
            if tree_total <= 0.0 {
                continue;
            }
            for (acc, v) in totals.iter_mut().zip(tree.importances()) {
                *acc += v / tree_total;
            }
        }
        let grand: f64 = totals.iter().sum();
        if grand > 0.0 {
            for v in &mut totals {
                *v /= grand;
            }
        }
        totals
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(self).map_err(ModelError::Serialize)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        let forest: Self = serde_json::from_slice(bytes).map_err(ModelError::Serialize)?;
        if forest.trees.is_empty() {
            return Err(ModelError::CorruptArtifact("no trees".into()));
        }
        if forest.n_features == 0 {
            return Err(ModelError::CorruptArtifact("zero input features".into()));
        }
        for (index, tree) in forest.trees.iter().enumerate() {
            tree.check(forest.n_features)
                .map_err(|reason| ModelError::CorruptArtifact(format!("tree {index}: {reason}")))?;
        }
        Ok(forest)
    }

    /// Read a model artifact written from [`RandomForest::to_json`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
