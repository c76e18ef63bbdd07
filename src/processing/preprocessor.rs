//! Composed feature preprocessor
//!
//! Fixed column routing over disjoint groups: rare-grouped categoricals go
//! through grouping then drop-first one-hot expansion, one designated
//! low-cardinality column goes through top-N indicator encoding, and numeric
//! columns go through the skew handler. The concatenated output column order
//! is declared as an ordered schema and preserved between training and
//! inference.

use super::rare::RareCategoryGrouper;
use super::skew::SkewHandler;
use super::topn::TopNEncoder;
use super::{f64_values, str_column, ColumnTransform};
use crate::config::ProcessingConfig;
use crate::error::{PredictError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Drop-first one-hot expansion over already-grouped categorical columns.
/// Categories are ordered lexically per column; the first is dropped as the
/// reference level. Values outside the fitted vocabulary encode to all
/// zeros rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DropFirstOneHot {
    columns: Vec<String>,
    // Per column: fitted categories minus the dropped first, lexical order
    kept_categories: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl DropFirstOneHot {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            kept_categories: HashMap::new(),
            is_fitted: false,
        }
    }

    fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|col| {
                self.kept_categories[col]
                    .iter()
                    .map(move |cat| format!("{col}_{cat}"))
            })
            .collect()
    }
}

impl ColumnTransform for DropFirstOneHot {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        for col_name in &self.columns {
            let ca = str_column(df, col_name)?;

            let mut categories: Vec<String> = ca
                .into_iter()
                .flatten()
                .map(|v| v.to_string())
                .collect();
            categories.sort();
            categories.dedup();

            if !categories.is_empty() {
                categories.remove(0);
            }
            self.kept_categories.insert(col_name.clone(), categories);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PredictError::FitState(
                "DropFirstOneHot::transform called before fit".to_string(),
            ));
        }

        let mut columns: Vec<Column> = Vec::new();
        for col_name in &self.columns {
            let ca = str_column(df, col_name)?;
            for category in &self.kept_categories[col_name] {
                let values: Vec<f64> = ca
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                columns.push(Column::new(
                    format!("{col_name}_{category}").into(),
                    values,
                ));
            }
        }

        DataFrame::new(columns).map_err(|e| PredictError::Data(e.to_string()))
    }
}

/// Composition of the three transformers across disjoint column groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    grouper: RareCategoryGrouper,
    one_hot: DropFirstOneHot,
    top_n: TopNEncoder,
    skew: SkewHandler,
    // Concatenated branch outputs in declaration order; the contract the
    // feature selector resolves names against
    output_columns: Vec<String>,
    is_fitted: bool,
}

impl FeaturePreprocessor {
    /// Build an unfitted preprocessor from processing settings
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            grouper: RareCategoryGrouper::new(
                config.rare_columns.clone(),
                config.rare_threshold,
                config.unseen_policy,
            ),
            one_hot: DropFirstOneHot::new(config.rare_columns.clone()),
            top_n: TopNEncoder::new(
                config.top_n_column.clone(),
                config.top_n,
                config.top_n_prefix.clone(),
            ),
            skew: SkewHandler::new(config.numerical_columns.clone(), config.skewness_threshold),
            output_columns: Vec::new(),
            is_fitted: false,
        }
    }

    /// Ordered names of the output columns, fixed at fit time
    pub fn output_schema(&self) -> &[String] {
        &self.output_columns
    }

    /// Save the fitted state to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a fitted preprocessor from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PredictError::Artifact(format!("cannot read preprocessor {}: {}", path.display(), e))
        })?;
        let preprocessor: Self = serde_json::from_str(&json)
            .map_err(|e| PredictError::Artifact(format!("corrupt preprocessor state: {e}")))?;
        if !preprocessor.is_fitted {
            return Err(PredictError::Artifact(
                "persisted preprocessor was never fitted".to_string(),
            ));
        }
        Ok(preprocessor)
    }
}

impl ColumnTransform for FeaturePreprocessor {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        self.grouper.fit(df)?;
        let grouped = self.grouper.transform(df)?;
        self.one_hot.fit(&grouped)?;
        self.top_n.fit(df)?;
        self.skew.fit(df)?;

        self.output_columns = self
            .one_hot
            .output_names()
            .into_iter()
            .chain(self.top_n.feature_names().iter().cloned())
            .chain(self.skew.columns().iter().cloned())
            .collect();

        info!(
            output_width = self.output_columns.len(),
            "fitted feature preprocessor"
        );
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PredictError::FitState(
                "FeaturePreprocessor::transform called before fit".to_string(),
            ));
        }

        let grouped = self.grouper.transform(df)?;
        let encoded = self.one_hot.transform(&grouped)?;
        let top_n = self.top_n.transform(df)?;
        let skewed = self.skew.transform(df)?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.output_columns.len());
        for series in encoded.get_columns() {
            columns.push(series.clone());
        }
        for series in top_n.get_columns() {
            columns.push(series.clone());
        }
        for col_name in self.skew.columns() {
            let values = f64_values(&skewed, col_name)?;
            columns.push(Column::new(col_name.as_str().into(), values));
        }

        let result = DataFrame::new(columns).map_err(|e| PredictError::Data(e.to_string()))?;
        debug_assert_eq!(
            result
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            self.output_columns
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnseenPolicy;

    fn sample_config() -> ProcessingConfig {
        ProcessingConfig {
            rare_columns: vec!["segment".to_string()],
            rare_threshold: 2,
            top_n_column: "meal_plan".to_string(),
            top_n: 2,
            top_n_prefix: "meal".to_string(),
            numerical_columns: vec!["lead_time".to_string(), "price".to_string()],
            skewness_threshold: 1.0,
            ..ProcessingConfig::default()
        }
    }

    fn sample_df() -> DataFrame {
        df!(
            "segment" => &["Online", "Online", "Online", "Offline", "Offline", "Aviation"],
            "meal_plan" => &["Plan 1", "Plan 1", "Plan 2", "Plan 2", "Plan 1", "Not Selected"],
            "lead_time" => &[3.0, 1.0, 0.0, 2.0, 1.0, 250.0],
            "price" => &[100.0, 90.0, 95.0, 105.0, 110.0, 99.0],
        )
        .unwrap()
    }

    #[test]
    fn test_output_schema_order() {
        let mut pre = FeaturePreprocessor::from_config(&sample_config());
        pre.fit(&sample_df()).unwrap();

        let schema = pre.output_schema();
        // Grouped segment column keeps {Offline, Online}, Aviation is rare:
        // sorted categories [Offline, Online, Other_segment], first dropped.
        assert_eq!(schema[0], "segment_Online");
        assert_eq!(schema[1], "segment_Other_segment");
        assert_eq!(schema[2], "meal_plan_1");
        assert_eq!(schema[3], "meal_plan_2");
        assert_eq!(schema[4], "lead_time");
        assert_eq!(schema[5], "price");
    }

    #[test]
    fn test_transform_matches_schema() {
        let mut pre = FeaturePreprocessor::from_config(&sample_config());
        let out = pre.fit_transform(&sample_df()).unwrap();

        assert_eq!(out.height(), 6);
        assert_eq!(out.width(), pre.output_schema().len());
        let names: Vec<String> = out
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, pre.output_schema());
    }

    #[test]
    fn test_single_row_inference_semantics() {
        let mut pre = FeaturePreprocessor::from_config(&sample_config());
        let bulk = pre.fit_transform(&sample_df()).unwrap();

        let single = df!(
            "segment" => &["Online"],
            "meal_plan" => &["Plan 1"],
            "lead_time" => &[3.0],
            "price" => &[100.0],
        )
        .unwrap();
        let row = pre.transform(&single).unwrap();

        assert_eq!(row.height(), 1);
        assert_eq!(row.width(), bulk.width());
        // The first bulk row had identical raw values; outputs must agree
        for name in pre.output_schema() {
            let bulk_v = bulk.column(name).unwrap().f64().unwrap().get(0);
            let row_v = row.column(name).unwrap().f64().unwrap().get(0);
            assert_eq!(bulk_v, row_v, "column {name} diverged");
        }
    }

    #[test]
    fn test_unknown_category_is_all_zero_after_one_hot() {
        let config = ProcessingConfig {
            unseen_policy: UnseenPolicy::PassThrough,
            ..sample_config()
        };
        let mut pre = FeaturePreprocessor::from_config(&config);
        pre.fit(&sample_df()).unwrap();

        // "Corporate" was never seen; with pass-through it survives grouping
        // and must encode to all zeros in the one-hot block.
        let single = df!(
            "segment" => &["Corporate"],
            "meal_plan" => &["Plan 1"],
            "lead_time" => &[3.0],
            "price" => &[100.0],
        )
        .unwrap();
        let row = pre.transform(&single).unwrap();

        for name in ["segment_Online", "segment_Other_segment"] {
            assert_eq!(row.column(name).unwrap().f64().unwrap().get(0), Some(0.0));
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = std::env::temp_dir().join("staysense_pre_roundtrip");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("preprocessor.json");

        let mut pre = FeaturePreprocessor::from_config(&sample_config());
        let before = pre.fit_transform(&sample_df()).unwrap();
        pre.save(&path).unwrap();

        let restored = FeaturePreprocessor::load(&path).unwrap();
        let after = restored.transform(&sample_df()).unwrap();

        assert!(before.equals(&after));
        assert_eq!(pre.output_schema(), restored.output_schema());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_artifact() {
        let err = FeaturePreprocessor::load("/nonexistent/preprocessor.json").unwrap_err();
        assert!(matches!(err, PredictError::Artifact(_)));
    }
}
