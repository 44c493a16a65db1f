// Regression error metrics for training and holdout evaluation.

use serde::Serialize;

/// Error summary of a set of predictions against known targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination. `None` when the targets are constant.
    pub r2: Option<f64>,
}

/// Compare predictions with targets. `None` for empty or mismatched input.
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Option<Evaluation> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut ss_tot = 0.0;
    for (t, p) in y_true.iter().zip(y_pred) {
        let err = t - p;
        abs_sum += err.abs();
        sq_sum += err * err;
        ss_tot += (t - mean).powi(2);
    }

    Some(Evaluation {
        n: y_true.len(),
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        r2: (ss_tot > 0.0).then(|| 1.0 - sq_sum / ss_tot),
    })
}
