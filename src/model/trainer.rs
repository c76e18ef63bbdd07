//! Model training and publication
//!
//! Loads the processed splits, tunes forest hyperparameters by randomized
//! search scored with k-fold cross-validated accuracy, fits the final
//! model, evaluates it on the test split, logs the run, and publishes the
//! model artifact to object storage. A failure anywhere aborts the run
//! with nothing published.

use super::metrics::ClassificationMetrics;
use super::random_forest::{ForestParams, RandomForest};
use crate::config::TrainingConfig;
use crate::error::{PredictError, Result};
use crate::processing::{columns_to_matrix, load_processed_split};
use crate::storage::BlobStore;
use crate::tracking::{Run, RunStore};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::info;

/// Result of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub best_params: ForestParams,
    pub cv_accuracy: f64,
    pub metrics: ClassificationMetrics,
    pub model_path: String,
}

/// Tunes, fits, evaluates, and publishes the served classifier
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Run the full training stage over processed train/test CSVs
    pub fn run(
        &self,
        train_path: &str,
        test_path: &str,
        blob_store: &dyn BlobStore,
        run_store: &RunStore,
    ) -> Result<TrainingOutcome> {
        let mut run = Run::start("train-cancellation-model");

        let outcome = self.train_and_evaluate(train_path, test_path, blob_store, &mut run);
        match outcome {
            Ok(outcome) => {
                run.finish();
                run_store.save(&run)?;
                Ok(outcome)
            }
            Err(err) => {
                run.fail();
                // Best effort: the failure itself is what must surface
                let _ = run_store.save(&run);
                Err(err)
            }
        }
    }

    fn train_and_evaluate(
        &self,
        train_path: &str,
        test_path: &str,
        blob_store: &dyn BlobStore,
        run: &mut Run,
    ) -> Result<TrainingOutcome> {
        info!(train_path, test_path, "loading processed data for training");
        let (x_train, y_train) = load_matrix(train_path)?;
        let (x_test, y_test) = load_matrix(test_path)?;

        let (best_params, cv_accuracy) = self.search_params(&x_train, &y_train)?;
        info!(?best_params, cv_accuracy, "hyperparameter search complete");

        run.log_param("n_estimators", best_params.n_estimators);
        run.log_param(
            "max_depth",
            best_params
                .max_depth
                .map_or("none".to_string(), |d| d.to_string()),
        );
        run.log_param("min_samples_split", best_params.min_samples_split);
        run.log_param("min_samples_leaf", best_params.min_samples_leaf);
        run.log_param("bootstrap", best_params.bootstrap);
        run.log_param("cv_folds", self.config.cv_folds);
        run.log_metric("cv_accuracy", cv_accuracy);

        info!("training final model with best parameters");
        let mut model = RandomForest::with_params(best_params.clone())
            .with_random_state(self.config.random_seed);
        model.fit(&x_train, &y_train)?;

        let y_pred = model.predict(&x_test)?;
        let metrics = ClassificationMetrics::compute(&y_test, &y_pred);
        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1_score,
            "test metrics"
        );
        run.log_metrics(metrics.as_map());

        model.save(&self.config.model_output_path)?;
        run.add_artifact(self.config.model_output_path.clone());

        blob_store.put(
            Path::new(&self.config.model_output_path),
            &self.config.bucket,
            &self.config.model_key,
        )?;
        info!(
            bucket = %self.config.bucket,
            key = %self.config.model_key,
            "published model artifact"
        );

        Ok(TrainingOutcome {
            run_id: run.run_id.clone(),
            best_params,
            cv_accuracy,
            metrics,
            model_path: self.config.model_output_path.clone(),
        })
    }

    /// Randomized search over forest hyperparameters, scored by k-fold
    /// cross-validated accuracy on the training split.
    fn search_params(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<(ForestParams, f64)> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        let mut best: Option<(ForestParams, f64)> = None;

        for trial in 0..self.config.n_trials.max(1) {
            let params = ForestParams {
                n_estimators: rng.gen_range(100..=500),
                max_depth: Some(rng.gen_range(10..=50)),
                min_samples_split: rng.gen_range(2..=10),
                min_samples_leaf: rng.gen_range(1..=5),
                bootstrap: rng.gen_bool(0.5),
            };

            let score = self.cross_validate(x, y, &params)?;
            info!(trial, score, ?params, "search trial scored");

            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((params, score));
            }
        }

        best.ok_or_else(|| PredictError::Training("hyperparameter search produced no trials".to_string()))
    }

    /// Mean accuracy over k contiguous folds of a seeded shuffle
    fn cross_validate(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        params: &ForestParams,
    ) -> Result<f64> {
        let n = x.nrows();
        let k = self.config.cv_folds.max(2);
        if n < k {
            return Err(PredictError::Training(format!(
                "{n} samples cannot fill {k} folds"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        // Fisher-Yates shuffle
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }

        let fold_size = n / k;
        let mut total = 0.0;

        for fold in 0..k {
            let start = fold * fold_size;
            let end = if fold == k - 1 { n } else { start + fold_size };
            let val_idx: Vec<usize> = order[start..end].to_vec();
            let train_idx: Vec<usize> = order[..start]
                .iter()
                .chain(order[end..].iter())
                .copied()
                .collect();

            let x_fold_train = x.select(Axis(0), &train_idx);
            let y_fold_train =
                Array1::from_vec(train_idx.iter().map(|&i| y[i]).collect());
            let x_fold_val = x.select(Axis(0), &val_idx);
            let y_fold_val = Array1::from_vec(val_idx.iter().map(|&i| y[i]).collect());

            let mut model = RandomForest::with_params(params.clone())
                .with_random_state(self.config.random_seed);
            model.fit(&x_fold_train, &y_fold_train)?;
            let y_pred = model.predict(&x_fold_val)?;

            total += ClassificationMetrics::compute(&y_fold_val, &y_pred).accuracy;
        }

        Ok(total / k as f64)
    }
}

/// Load a processed split CSV into (features, labels)
fn load_matrix(path: &str) -> Result<(Array2<f64>, Array1<f64>)> {
    let (features, y) = load_processed_split(path)?;
    let names: Vec<String> = features
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let x = columns_to_matrix(&features, &names)?;
    Ok((x, y))
}
