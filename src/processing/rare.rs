//! Rare-category grouping
//!
//! Learns, per categorical column, the set of values whose training-set
//! frequency falls below a threshold, and replaces them with the column's
//! `Other_<column>` sentinel on every subsequent transform.

use super::{str_column, ColumnTransform};
use crate::config::UnseenPolicy;
use crate::error::{PredictError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Sentinel value for grouped categories of a column
pub fn other_sentinel(column: &str) -> String {
    format!("Other_{column}")
}

/// Groups low-frequency categorical values into a per-column sentinel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RareCategoryGrouper {
    columns: Vec<String>,
    threshold: usize,
    unseen_policy: UnseenPolicy,
    // Frozen at fit time: column -> values below threshold
    rare_categories: HashMap<String, HashSet<String>>,
    // Frozen at fit time: column -> values at or above threshold
    kept_categories: HashMap<String, HashSet<String>>,
    is_fitted: bool,
}

impl RareCategoryGrouper {
    /// Create a grouper over the given columns
    pub fn new(columns: Vec<String>, threshold: usize, unseen_policy: UnseenPolicy) -> Self {
        Self {
            columns,
            threshold,
            unseen_policy,
            rare_categories: HashMap::new(),
            kept_categories: HashMap::new(),
            is_fitted: false,
        }
    }

    /// The rare set learned for a column, if fitted
    pub fn rare_set(&self, column: &str) -> Option<&HashSet<String>> {
        self.rare_categories.get(column)
    }

    fn map_value(&self, column: &str, value: &str, rare: &HashSet<String>) -> String {
        if rare.contains(value) {
            return other_sentinel(column);
        }
        match self.unseen_policy {
            UnseenPolicy::PassThrough => value.to_string(),
            UnseenPolicy::GroupToOther => {
                if self.kept_categories[column].contains(value) {
                    value.to_string()
                } else {
                    other_sentinel(column)
                }
            }
        }
    }
}

impl ColumnTransform for RareCategoryGrouper {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        for col_name in &self.columns {
            let ca = str_column(df, col_name)?;

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for value in ca.into_iter().flatten() {
                *counts.entry(value).or_insert(0) += 1;
            }

            let mut rare = HashSet::new();
            let mut kept = HashSet::new();
            for (value, count) in counts {
                if count < self.threshold {
                    rare.insert(value.to_string());
                } else {
                    kept.insert(value.to_string());
                }
            }

            debug!(
                column = %col_name,
                rare = rare.len(),
                kept = kept.len(),
                "fitted rare-category sets"
            );
            self.rare_categories.insert(col_name.clone(), rare);
            self.kept_categories.insert(col_name.clone(), kept);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PredictError::FitState(
                "RareCategoryGrouper::transform called before fit".to_string(),
            ));
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|col_name| {
                let rare = &self.rare_categories[col_name];
                let ca = str_column(df, col_name)?;
                let mapped: StringChunked = ca
                    .into_iter()
                    .map(|opt| opt.map(|v| self.map_value(col_name, v, rare)))
                    .collect();
                Ok(mapped.with_name(col_name.as_str().into()).into_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for grouped in replacements {
            result = result
                .with_column(grouped)
                .map_err(|e| PredictError::Data(e.to_string()))?
                .clone();
        }

        Ok(result)
    }
}
