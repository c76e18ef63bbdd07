//! Top-N indicator encoding
//!
//! Reduces one categorical column to binary indicator columns for its N
//! most frequent fit-time values. Categories outside the list (or unseen
//! entirely) encode to all zeros.

use super::{str_column, ColumnTransform};
use crate::error::{PredictError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Encodes the top N categories of one column as 0/1 indicators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNEncoder {
    column: String,
    n: usize,
    prefix: String,
    // Frozen at fit time, most frequent first; order fixes indicator order
    top_categories: Vec<String>,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl TopNEncoder {
    /// Create an encoder for one column
    pub fn new(column: impl Into<String>, n: usize, prefix: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            n,
            prefix: prefix.into(),
            top_categories: Vec::new(),
            feature_names: Vec::new(),
            is_fitted: false,
        }
    }

    /// Indicator column names, in output order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Retained categories, most frequent first
    pub fn top_categories(&self) -> &[String] {
        &self.top_categories
    }

    fn derive_name(&self, category: &str) -> String {
        format!(
            "{}_{}",
            self.prefix,
            category.replace(' ', "_").to_lowercase()
        )
    }
}

impl ColumnTransform for TopNEncoder {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let ca = str_column(df, &self.column)?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in ca.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        // Rank by frequency; break count ties by value for a stable order
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        self.top_categories = ranked
            .into_iter()
            .take(self.n)
            .map(|(value, _)| value.to_string())
            .collect();
        self.feature_names = self
            .top_categories
            .iter()
            .map(|cat| self.derive_name(cat))
            .collect();

        debug!(
            column = %self.column,
            categories = ?self.top_categories,
            "fitted top-N categories"
        );
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PredictError::FitState(
                "TopNEncoder::transform called before fit".to_string(),
            ));
        }

        let ca = str_column(df, &self.column)?;

        let columns: Vec<Column> = self
            .top_categories
            .iter()
            .zip(self.feature_names.iter())
            .map(|(category, feat_name)| {
                let values: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                Column::new(feat_name.as_str().into(), values)
            })
            .collect();

        DataFrame::new(columns).map_err(|e| PredictError::Data(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_df() -> DataFrame {
        df!(
            "meal_plan" => &[
                "Meal Plan 1", "Meal Plan 1", "Meal Plan 1",
                "Meal Plan 2", "Meal Plan 2",
                "Not Selected", "Not Selected", "Not Selected", "Not Selected",
                "Meal Plan 3",
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_fit_ranks_by_frequency() {
        let mut encoder = TopNEncoder::new("meal_plan", 3, "meal");
        encoder.fit(&fit_df()).unwrap();

        assert_eq!(
            encoder.top_categories(),
            &["Not Selected", "Meal Plan 1", "Meal Plan 2"]
        );
        assert_eq!(
            encoder.feature_names(),
            &["meal_not_selected", "meal_meal_plan_1", "meal_meal_plan_2"]
        );
    }

    #[test]
    fn test_transform_indicators() {
        let mut encoder = TopNEncoder::new("meal_plan", 3, "meal");
        encoder.fit(&fit_df()).unwrap();

        let input = df!(
            "meal_plan" => &["Meal Plan 1", "Meal Plan 3", "Unseen Plan"],
        )
        .unwrap();
        let result = encoder.transform(&input).unwrap();

        assert_eq!(result.width(), 3);
        let plan1 = result.column("meal_meal_plan_1").unwrap().f64().unwrap();
        assert_eq!(plan1.get(0), Some(1.0));
        assert_eq!(plan1.get(1), Some(0.0));

        // Outside top-N and unseen both encode to all zeros
        for row in 1..3 {
            for name in encoder.feature_names() {
                let value = result.column(name).unwrap().f64().unwrap().get(row);
                assert_eq!(value, Some(0.0));
            }
        }
    }

    #[test]
    fn test_width_capped_by_distinct_count() {
        let df = df!("meal_plan" => &["A", "A", "B"]).unwrap();
        let mut encoder = TopNEncoder::new("meal_plan", 5, "meal");
        encoder.fit(&df).unwrap();

        assert_eq!(encoder.feature_names().len(), 2);
        let result = encoder.transform(&df).unwrap();
        assert_eq!(result.width(), 2);
    }

    #[test]
    fn test_repeated_transform_is_stable() {
        let mut encoder = TopNEncoder::new("meal_plan", 3, "meal");
        encoder.fit(&fit_df()).unwrap();

        let input = df!("meal_plan" => &["Meal Plan 2", "Not Selected"]).unwrap();
        let first = encoder.transform(&input).unwrap();
        let second = encoder.transform(&input).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let encoder = TopNEncoder::new("meal_plan", 3, "meal");
        let err = encoder.transform(&fit_df()).unwrap_err();
        assert!(matches!(err, PredictError::FitState(_)));
    }
}
