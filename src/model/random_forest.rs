//! Random forest classifier
//!
//! Bagged CART trees with per-tree feature subsampling, majority-vote
//! prediction, and averaged impurity-decrease importances. Trees build in
//! parallel from deterministic per-tree seeds, so a fixed random state
//! yields a reproducible forest.

use super::decision_tree::{Criterion, DecisionTree};
use crate::error::{PredictError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Hyperparameters of a forest fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
        }
    }
}

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    params: ForestParams,
    random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForest {
    /// Create an unfitted forest with the given tree count
    pub fn new(n_estimators: usize) -> Self {
        Self::with_params(ForestParams {
            n_estimators,
            ..ForestParams::default()
        })
    }

    /// Create an unfitted forest from explicit hyperparameters
    pub fn with_params(params: ForestParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
            random_state: None,
            n_features: 0,
            classes: Vec::new(),
            feature_importances: None,
        }
    }

    /// Set the random state for reproducible fits
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// The hyperparameters this forest was configured with
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Width of the feature matrix the forest was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PredictError::Shape {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PredictError::Training("empty training set".to_string()));
        }

        self.n_features = n_features;

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        self.classes = classes;

        let max_features = ((n_features as f64).sqrt().ceil() as usize).max(1);
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Vec<DecisionTree> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.params.bootstrap {
                    (0..n_samples)
                        .map(|_| (rng.next_u64() as usize) % n_samples)
                        .collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                let mut tree = DecisionTree::new().with_criterion(Criterion::Gini);
                if let Some(depth) = self.params.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree = tree
                    .with_min_samples_split(self.params.min_samples_split)
                    .with_min_samples_leaf(self.params.min_samples_leaf);
                tree.max_features = Some(max_features);
                tree.fit(&x_boot, &y_boot).ok();

                tree
            })
            .collect();

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    if i < self.n_features {
                        totals[i] += val;
                    }
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut totals {
            *imp /= n_trees;
        }
        let total: f64 = totals.iter().sum();
        if total > 0.0 {
            for imp in &mut totals {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(totals));
    }

    /// Predict class labels by majority vote
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let all_predictions = self.tree_predictions(x)?;
        let n_samples = x.nrows();

        let predictions: Vec<f64> = (0..n_samples)
            .map(|i| {
                let mut votes: HashMap<i64, usize> = HashMap::new();
                for preds in &all_predictions {
                    *votes.entry(preds[i].round() as i64).or_insert(0) += 1;
                }
                votes
                    .into_iter()
                    .max_by_key(|&(class, count)| (count, std::cmp::Reverse(class)))
                    .map(|(class, _)| class as f64)
                    .unwrap_or(0.0)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Predict per-class vote shares
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let all_predictions = self.tree_predictions(x)?;
        let n_samples = x.nrows();
        let n_classes = self.classes.len();

        let mut proba = Array2::zeros((n_samples, n_classes));
        for i in 0..n_samples {
            for preds in &all_predictions {
                let class = preds[i].round() as i64;
                if let Some(class_idx) = self
                    .classes
                    .iter()
                    .position(|&c| c.round() as i64 == class)
                {
                    proba[[i, class_idx]] += 1.0;
                }
            }
            let row_sum: f64 = proba.row(i).sum();
            if row_sum > 0.0 {
                for j in 0..n_classes {
                    proba[[i, j]] /= row_sum;
                }
            }
        }

        Ok(proba)
    }

    fn tree_predictions(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if self.trees.is_empty() {
            return Err(PredictError::FitState(
                "forest predict before fit".to_string(),
            ));
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .filter_map(|tree| tree.predict(x).ok())
            .collect();

        if all_predictions.is_empty() {
            return Err(PredictError::Training(
                "no tree could make predictions".to_string(),
            ));
        }
        Ok(all_predictions)
    }

    /// Averaged, normalized importances across trees
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Save the fitted forest to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a fitted forest from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PredictError::Artifact(format!("cannot read model {}: {}", path.display(), e))
        })?;
        let forest: Self = serde_json::from_str(&json)
            .map_err(|e| PredictError::Artifact(format!("corrupt model artifact: {e}")))?;
        if forest.trees.is_empty() {
            return Err(PredictError::Artifact(
                "persisted model has no fitted trees".to_string(),
            ));
        }
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier_accuracy() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(10).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;
        assert!(accuracy >= 0.8, "accuracy too low: {accuracy}");
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (x, y) = toy_data();

        let mut a = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        let mut b = RandomForest::new(10).with_random_state(7);
        b.fit(&x, &y).unwrap();

        assert_eq!(
            a.predict(&x).unwrap().to_vec(),
            b.predict(&x).unwrap().to_vec()
        );
        assert_eq!(
            a.feature_importances().unwrap().to_vec(),
            b.feature_importances().unwrap().to_vec()
        );
    }

    #[test]
    fn test_predict_proba_sums_to_one() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(10).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let proba = forest.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for i in 0..proba.nrows() {
            let row_sum: f64 = proba.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_save_load_predictions_match() {
        let (x, y) = toy_data();
        let mut forest = RandomForest::new(5).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let dir = std::env::temp_dir().join("staysense_forest_roundtrip");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("model.json");

        forest.save(&path).unwrap();
        let restored = RandomForest::load(&path).unwrap();

        assert_eq!(
            forest.predict(&x).unwrap().to_vec(),
            restored.predict(&x).unwrap().to_vec()
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forest = RandomForest::new(5);
        let x = array![[0.0, 0.0]];
        assert!(matches!(
            forest.predict(&x).unwrap_err(),
            PredictError::FitState(_)
        ));
    }
}
