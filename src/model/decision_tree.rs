//! Classification decision tree
//!
//! A CART-style binary tree over f64 feature matrices. Splits maximize
//! impurity decrease under the configured criterion; impurity decrease per
//! feature accumulates into the importance vector the feature selector and
//! the forest consume.

use crate::error::{PredictError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Impurity criterion for split quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    Gini,
    Entropy,
}

/// Tree node: either a class leaf or a threshold split
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Classification decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<Node>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set impurity criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PredictError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PredictError::Training("empty training set".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PredictError::FitState("tree predict before fit".to_string()))?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| Self::predict_row(root, &x.row(i).to_vec()))
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    fn predict_row(node: &Node, row: &[f64]) -> f64 {
        match node {
            Node::Leaf { class, .. } => *class,
            Node::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if row.get(*feature_idx).copied().unwrap_or(0.0) <= *threshold {
                    Self::predict_row(left, row)
                } else {
                    Self::predict_row(right, row)
                }
            }
        }
    }

    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> Node {
        let n_samples = indices.len();
        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.is_some_and(|d| depth >= d)
            || Self::is_pure(&labels);

        if should_stop {
            return Node::Leaf {
                class: Self::majority_class(&labels),
                n_samples,
            };
        }

        let Some((feature_idx, threshold, gain)) = self.best_split(x, y, indices) else {
            return Node::Leaf {
                class: Self::majority_class(&labels),
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf
        {
            return Node::Leaf {
                class: Self::majority_class(&labels),
                n_samples,
            };
        }

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_node(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_node(x, y, &right_indices, depth + 1, importances));

        Node::Split {
            feature_idx,
            threshold,
            left,
            right,
        }
    }

    /// Scan candidate features for the split with the largest impurity
    /// decrease. Returns (feature, threshold, gain).
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let n_to_try = self.max_features.unwrap_or(n_features).min(n_features);
        let n = indices.len() as f64;

        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent_impurity = self.impurity_of(&labels);

        let mut best: Option<(usize, f64, f64)> = None;

        for feature_idx in 0..n_to_try {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left_counts: HashMap<i64, usize> = HashMap::new();
                let mut right_counts: HashMap<i64, usize> = HashMap::new();
                let mut left_n = 0usize;
                let mut right_n = 0usize;

                for &idx in indices {
                    let class = y[idx].round() as i64;
                    if x[[idx, feature_idx]] <= threshold {
                        *left_counts.entry(class).or_insert(0) += 1;
                        left_n += 1;
                    } else {
                        *right_counts.entry(class).or_insert(0) += 1;
                        right_n += 1;
                    }
                }

                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left_n as f64 * self.impurity_from_counts(left_n, &left_counts)
                    + right_n as f64 * self.impurity_from_counts(right_n, &right_counts))
                    / n;
                let gain = parent_impurity - weighted;

                if gain > 0.0 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    fn impurity_from_counts(&self, n: usize, counts: &HashMap<i64, usize>) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let nf = n as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - counts
                    .values()
                    .map(|&c| (c as f64 / nf).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .values()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / nf;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }

    fn impurity_of(&self, labels: &[f64]) -> f64 {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &v in labels {
            *counts.entry(v.round() as i64).or_insert(0) += 1;
        }
        self.impurity_from_counts(labels.len(), &counts)
    }

    fn is_pure(labels: &[f64]) -> bool {
        labels
            .first()
            .map_or(true, |&first| labels.iter().all(|&v| v == first))
    }

    fn majority_class(labels: &[f64]) -> f64 {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &v in labels {
            *counts.entry(v.round() as i64).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(class, count)| (count, std::cmp::Reverse(class)))
            .map(|(class, _)| class as f64)
            .unwrap_or(0.0)
    }
}
