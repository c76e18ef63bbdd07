//! Importance-based feature selection
//!
//! Trains a disposable ranking forest on the transformed training matrix,
//! sorts columns by importance, and keeps the top K. The persisted artifact
//! is the ordered list of selected column *names*; positions are resolved
//! against the preprocessor's output schema at apply time, so a reordered
//! or drifted schema is caught instead of silently mis-slicing.

use super::columns_to_matrix;
use crate::error::{PredictError, Result};
use crate::model::RandomForest;
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Number of trees in the disposable ranking forest
const RANKER_TREES: usize = 100;

/// Ordered list of selected output-column names, descending importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeatures {
    columns: Vec<String>,
}

impl SelectedFeatures {
    /// The selected names, descending importance
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Resolve names to positions in the given output schema. Fails with
    /// an artifact error when a selected name is absent: the selection and
    /// the preprocessor did not come from the same training run.
    pub fn resolve(&self, schema: &[String]) -> Result<Vec<usize>> {
        self.columns
            .iter()
            .map(|name| {
                schema.iter().position(|s| s == name).ok_or_else(|| {
                    PredictError::Artifact(format!(
                        "selected feature {name:?} not in preprocessor output schema"
                    ))
                })
            })
            .collect()
    }

    /// Slice a matrix down to the selected columns, in selection order
    pub fn apply(&self, x: &Array2<f64>, schema: &[String]) -> Result<Array2<f64>> {
        let indices = self.resolve(schema)?;
        let mut result = Array2::zeros((x.nrows(), indices.len()));
        for (new_idx, &old_idx) in indices.iter().enumerate() {
            if old_idx >= x.ncols() {
                return Err(PredictError::Shape {
                    expected: format!("at least {} columns", old_idx + 1),
                    actual: format!("{} columns", x.ncols()),
                });
            }
            result.column_mut(new_idx).assign(&x.column(old_idx));
        }
        Ok(result)
    }

    /// Slice a transformed DataFrame down to the selected columns
    pub fn apply_df(&self, df: &DataFrame, schema: &[String]) -> Result<Array2<f64>> {
        let x = columns_to_matrix(df, schema)?;
        self.apply(&x, schema)
    }

    /// Save the selection to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a selection from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PredictError::Artifact(format!("cannot read selection {}: {}", path.display(), e))
        })?;
        let selection: Self = serde_json::from_str(&json)
            .map_err(|e| PredictError::Artifact(format!("corrupt selection artifact: {e}")))?;

        let unique: HashSet<&String> = selection.columns.iter().collect();
        if unique.len() != selection.columns.len() {
            return Err(PredictError::Artifact(
                "selection artifact contains duplicate columns".to_string(),
            ));
        }
        Ok(selection)
    }
}

/// Ranks preprocessor output columns by forest importance and keeps the top K
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    no_of_top_features: usize,
    random_seed: u64,
}

impl FeatureSelector {
    /// Create a selector retaining the top K columns
    pub fn new(no_of_top_features: usize, random_seed: u64) -> Self {
        Self {
            no_of_top_features,
            random_seed,
        }
    }

    /// Fit the ranking forest and derive the selected-name list.
    /// `schema` names the columns of `x` in order.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        schema: &[String],
    ) -> Result<SelectedFeatures> {
        let n_features = x.ncols();
        if schema.len() != n_features {
            return Err(PredictError::Shape {
                expected: format!("{} schema names", n_features),
                actual: format!("{}", schema.len()),
            });
        }
        if self.no_of_top_features > n_features {
            return Err(PredictError::Config(format!(
                "no_of_top_features = {} exceeds available columns = {}",
                self.no_of_top_features, n_features
            )));
        }

        let mut ranker = RandomForest::new(RANKER_TREES).with_random_state(self.random_seed);
        ranker.fit(x, y)?;

        let importances = ranker.feature_importances().ok_or_else(|| {
            PredictError::Training("ranking forest produced no importances".to_string())
        })?;

        // Stable descending sort: equal scores keep schema order
        let mut ranked: Vec<(usize, f64)> = importances.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let columns: Vec<String> = ranked
            .iter()
            .take(self.no_of_top_features)
            .map(|&(idx, _)| schema[idx].clone())
            .collect();

        info!(
            selected = self.no_of_top_features,
            total = n_features,
            top = ?columns.first(),
            "selected top features by forest importance"
        );

        Ok(SelectedFeatures { columns })
    }
}
