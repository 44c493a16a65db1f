// CART regression tree grown on variance reduction.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Growth limits shared by every tree of a forest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features examined at each split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree. Nodes are stored in a flat arena with the
/// root at index 0; samples with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Total weighted impurity decrease contributed by each feature.
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    /// Number of samples that go left, in sorted order.
    position: usize,
    threshold: f64,
    score: f64,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> Grower<'a> {
    fn grow(&mut self, indices: &mut [usize], depth: usize, rng: &mut SmallRng) -> usize {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let mean = sum / n as f64;

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let pure = indices.iter().all(|&i| self.y[i] == self.y[indices[0]]);
        if depth_reached || n < self.params.min_samples_split || n < 2 * self.params.min_samples_leaf || pure {
            return node_id;
        }

        let Some(best) = self.best_split(indices, sum, rng) else {
            return node_id;
        };

        let parent_score = sum * sum / n as f64;
        self.importances[best.feature] += (best.score - parent_score).max(0.0);

        let feature = best.feature;
        indices.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
        let (left_idx, right_idx) = indices.split_at_mut(best.position);
        let left = self.grow(left_idx, depth + 1, rng);
        let right = self.grow(right_idx, depth + 1, rng);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_id
    }

    /// Find the split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which is
    /// equivalent to minimizing the children's summed squared error.
    /// Features are visited in a shuffled order; the first strictly best
    /// candidate wins ties. `None` when no feature separates the samples.
    fn best_split(&self, indices: &mut [usize], total: f64, rng: &mut SmallRng) -> Option<BestSplit> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);
        features.truncate(self.params.max_features.max(1));

        let mut best: Option<BestSplit> = None;
        for feature in features {
            indices.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.y[indices[pos - 1]];
                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.x[indices[pos - 1]][feature];
                let hi = self.x[indices[pos]][feature];
                if lo >= hi {
                    continue;
                }
                let right_sum = total - left_sum;
                let score = left_sum * left_sum / pos as f64
                    + right_sum * right_sum / (n - pos) as f64;
                if best.as_ref().map_or(true, |b| score > b.score) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // Midpoint can round up to `hi` for adjacent floats.
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        position: pos,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` selected by `indices` (duplicates
    /// allowed, as produced by bootstrap sampling).
    pub(crate) fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        mut indices: Vec<usize>,
        n_features: usize,
        params: TreeParams,
        rng: &mut SmallRng,
    ) -> Self {
        let mut grower = Grower {
            x,
            y,
            params,
            n_features,
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        if !indices.is_empty() {
            grower.grow(&mut indices, 0, rng);
        } else {
            grower.nodes.push(Node::Leaf { value: 0.0 });
        }
        Self {
            nodes: grower.nodes,
            importances: grower.importances,
        }
    }

    pub fn predict(&self, sample: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = sample.get(*feature).copied().unwrap_or(0.0);
                    id = if v <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    pub(crate) fn importances(&self) -> &[f64] {
        &self.importances
    }

    /// Structural check for trees read back from an artifact: a non-empty
    /// arena, children stored after their parent and inside the arena,
    /// split features within `n_features`, and finite values.
    pub(crate) fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        if self.importances.len() != n_features {
            return Err(format!(
                "tree tracks {} feature importances, expected {}",
                self.importances.len(),
                n_features
            ));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {id} has a non-finite value"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {id} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {id} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(format!("node {id} points to invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y depends only on feature 0: a step at 5.
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 9.0 }).collect();
        (x, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = step_data();
        let mut rng = SmallRng::seed_from_u64(7);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, params(), &mut rng);
        assert_eq!(tree.predict(&[2.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[7.0, 0.0]), 9.0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        assert!(tree.importances()[0] > 0.0);
        assert_eq!(tree.importances()[1], 0.0);
    }

    #[test]
    fn threshold_is_midpoint_between_distinct_values() {
        let (x, y) = step_data();
        let mut rng = SmallRng::seed_from_u64(7);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, params(), &mut rng);
        assert_eq!(tree.predict(&[4.5, 0.0]), 1.0);
        assert_eq!(tree.predict(&[4.6, 0.0]), 9.0);
    }

    #[test]
    fn depth_limit_stops_growth() {
        let (x, y) = step_data();
        let mut rng = SmallRng::seed_from_u64(7);
        let p = TreeParams {
            max_depth: Some(0),
            ..params()
        };
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, p, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[0.0, 0.0]), 5.0);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let y = vec![0.0, 0.0, 0.0, 0.0, 0.0, 100.0];
        let mut rng = SmallRng::seed_from_u64(1);
        let p = TreeParams {
            min_samples_leaf: 2,
            max_features: 1,
            ..params()
        };
        let tree = RegressionTree::fit(&x, &y, (0..6).collect(), 1, p, &mut rng);
        // The lone outlier cannot sit in its own leaf.
        assert_eq!(tree.predict(&[5.0]), 50.0);
    }

    #[test]
    fn constant_features_produce_a_single_leaf() {
        let x = vec![vec![1.0, 1.0]; 4];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let mut rng = SmallRng::seed_from_u64(3);
        let tree = RegressionTree::fit(&x, &y, (0..4).collect(), 2, params(), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[1.0, 1.0]), 2.5);
    }

    #[test]
    fn fitted_trees_pass_the_structural_check() {
        let (x, y) = step_data();
        let mut rng = SmallRng::seed_from_u64(7);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, params(), &mut rng);
        assert!(tree.check(2).is_ok());
        assert!(tree.check(1).is_err());
    }

    #[test]
    fn check_rejects_broken_arenas() {
        let empty = RegressionTree {
            nodes: vec![],
            importances: vec![0.0],
        };
        assert!(empty.check(1).is_err());

        let cycle = RegressionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 0,
            }],
            importances: vec![0.0],
        };
        assert!(cycle.check(1).unwrap_err().contains("invalid child 0"));

        let dangling = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 1,
                    right: 5,
                },
                Node::Leaf { value: 1.0 },
            ],
            importances: vec![0.0],
        };
        assert!(dangling.check(1).is_err());
    }

    #[test]
    fn duplicate_indices_weight_samples() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0.0, 10.0];
        let mut rng = SmallRng::seed_from_u64(3);
        let p = TreeParams {
            max_depth: Some(0),
            max_features: 1,
            ..params()
        };
        let tree = RegressionTree::fit(&x, &y, vec![0, 1, 1, 1], 1, p, &mut rng);
        assert_eq!(tree.predict(&[0.0]), 7.5);
    }
}
