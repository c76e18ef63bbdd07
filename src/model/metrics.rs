//! Classification evaluation metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binary classification metrics for a prediction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute metrics from true and predicted {0,1} labels
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n_samples = y_true.len();

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (*t - *p).abs() < 0.5)
            .count();
        let accuracy = if n_samples > 0 {
            correct as f64 / n_samples as f64
        } else {
            0.0
        };

        let (tp, fp, _tn, fn_) = Self::confusion_counts(y_true, y_pred);

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            n_samples,
        }
    }

    /// Named scalar view, the shape the run store logs
    pub fn as_map(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("precision".to_string(), self.precision),
            ("recall".to_string(), self.recall),
            ("f1".to_string(), self.f1_score),
        ])
    }

    fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
        let mut tp = 0;
        let mut fp = 0;
        let mut tn = 0;
        let mut fn_ = 0;

        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        (tp, fp, tn, fn_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let metrics = ClassificationMetrics::compute(&y, &y);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
    }

    #[test]
    fn test_mixed_predictions() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let metrics = ClassificationMetrics::compute(&y_true, &y_pred);
        assert_eq!(metrics.accuracy, 0.75);
        // tp=3, fp=1, fn=1
        assert_eq!(metrics.precision, 0.75);
        assert_eq!(metrics.recall, 0.75);
        assert!((metrics.f1_score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_no_positive_predictions() {
        let y_true = array![1.0, 1.0];
        let y_pred = array![0.0, 0.0];

        let metrics = ClassificationMetrics::compute(&y_true, &y_pred);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
    }
}
