//! Application configuration
//!
//! Nested settings for ingestion, processing, training, and serving,
//! loaded from a YAML file with per-section defaults.

use crate::error::{PredictError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Policy for categorical values never seen during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenPolicy {
    /// Pass unseen values through unchanged
    PassThrough,
    /// Route unseen values to the `Other_<column>` sentinel
    GroupToOther,
}

impl Default for UnseenPolicy {
    fn default() -> Self {
        UnseenPolicy::GroupToOther
    }
}

/// Policy for numeric columns absent from an inference record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingNumericPolicy {
    /// Reject the record with a schema error
    Error,
    /// Insert 0.0 before transforming (schema-drift compatibility shim)
    Zero,
}

impl Default for MissingNumericPolicy {
    fn default() -> Self {
        MissingNumericPolicy::Error
    }
}

/// Settings for the ingestion stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Object-store bucket holding the raw dataset
    pub bucket: String,
    /// Object key of the raw dataset
    pub key: String,
    /// Local directory for the cached raw file and the split outputs
    pub raw_data_dir: String,
    /// Fraction of rows assigned to the training split
    pub train_ratio: f64,
    /// Seed for the shuffle split
    pub random_seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            bucket: "hotel-reservations".to_string(),
            key: "training_data/hotel_reservations.csv".to_string(),
            raw_data_dir: "data/raw".to_string(),
            train_ratio: 0.8,
            random_seed: 42,
        }
    }
}

impl IngestionConfig {
    /// Path of the cached raw CSV
    pub fn raw_path(&self) -> String {
        format!("{}/hotel_reservations.csv", self.raw_data_dir)
    }

    /// Path of the training split CSV
    pub fn train_path(&self) -> String {
        format!("{}/train_hotel_reservations.csv", self.raw_data_dir)
    }

    /// Path of the test split CSV
    pub fn test_path(&self) -> String {
        format!("{}/test_hotel_reservations.csv", self.raw_data_dir)
    }
}

/// Settings for the feature-processing stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Columns routed through rare-category grouping then one-hot encoding
    pub rare_columns: Vec<String>,
    /// Frequency below which a category counts as rare
    pub rare_threshold: usize,
    /// Column routed through top-N indicator encoding
    pub top_n_column: String,
    /// Number of categories the top-N encoder keeps
    pub top_n: usize,
    /// Prefix for the top-N indicator column names
    pub top_n_prefix: String,
    /// Columns routed through the skewness handler
    pub numerical_columns: Vec<String>,
    /// Absolute skewness above which a column is transformed
    pub skewness_threshold: f64,
    /// Number of columns the feature selector retains
    pub no_of_top_features: usize,
    /// Seed for the selector's ranking forest
    pub random_seed: u64,
    /// Directory for fitted preprocessor / selection artifacts
    pub artifacts_dir: String,
    /// Output path of the processed training set
    pub proc_train_file: String,
    /// Output path of the processed test set
    pub proc_test_file: String,
    /// Handling of categories unseen at fit time
    pub unseen_policy: UnseenPolicy,
    /// Handling of numeric columns absent at inference
    pub missing_numeric_policy: MissingNumericPolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            rare_columns: vec![
                "market_segment_type".to_string(),
                "room_type_reserved".to_string(),
            ],
            rare_threshold: 500,
            top_n_column: "type_of_meal_plan".to_string(),
            top_n: 3,
            top_n_prefix: "meal".to_string(),
            numerical_columns: vec![
                "lead_time".to_string(),
                "no_of_special_requests".to_string(),
                "avg_price_per_room".to_string(),
                "arrival_month".to_string(),
                "arrival_date".to_string(),
                "no_of_week_nights".to_string(),
                "no_of_weekend_nights".to_string(),
            ],
            skewness_threshold: 1.0,
            no_of_top_features: 10,
            random_seed: 42,
            artifacts_dir: "artifacts".to_string(),
            proc_train_file: "data/processed/train_processed.csv".to_string(),
            proc_test_file: "data/processed/test_processed.csv".to_string(),
            unseen_policy: UnseenPolicy::default(),
            missing_numeric_policy: MissingNumericPolicy::default(),
        }
    }
}

impl ProcessingConfig {
    /// Path of the persisted fitted preprocessor
    pub fn preprocessor_path(&self) -> String {
        format!("{}/preprocessor.json", self.artifacts_dir)
    }

    /// Path of the persisted selected-feature list
    pub fn selection_path(&self) -> String {
        format!("{}/selection.json", self.artifacts_dir)
    }

    /// Builder method to set the rare-category threshold
    pub fn with_rare_threshold(mut self, threshold: usize) -> Self {
        self.rare_threshold = threshold;
        self
    }

    /// Builder method to set the skewness threshold
    pub fn with_skewness_threshold(mut self, threshold: f64) -> Self {
        self.skewness_threshold = threshold;
        self
    }

    /// Builder method to set the number of retained features
    pub fn with_top_features(mut self, k: usize) -> Self {
        self.no_of_top_features = k;
        self
    }

    /// Builder method to set the unseen-category policy
    pub fn with_unseen_policy(mut self, policy: UnseenPolicy) -> Self {
        self.unseen_policy = policy;
        self
    }

    /// Builder method to set the missing-numeric policy
    pub fn with_missing_numeric_policy(mut self, policy: MissingNumericPolicy) -> Self {
        self.missing_numeric_policy = policy;
        self
    }
}

/// Settings for the training stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of randomized hyperparameter search trials
    pub n_trials: usize,
    /// Folds for cross-validated trial scoring
    pub cv_folds: usize,
    /// Seed for the search and the final fit
    pub random_seed: u64,
    /// Local path of the trained model artifact
    pub model_output_path: String,
    /// Object-store bucket for model publication
    pub bucket: String,
    /// Object key for the published model
    pub model_key: String,
    /// Directory for experiment run records
    pub runs_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_trials: 25,
            cv_folds: 5,
            random_seed: 42,
            model_output_path: "artifacts/model.json".to_string(),
            bucket: "hotel-reservations".to_string(),
            model_key: "models/model.json".to_string(),
            runs_dir: "runs".to_string(),
        }
    }
}

/// Settings for the serving stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingestion: IngestionConfig,
    pub processing: ProcessingConfig,
    pub training: TrainingConfig,
    pub serving: ServingConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PredictError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from a YAML file if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.processing.rare_threshold, 500);
        assert_eq!(config.processing.top_n, 3);
        assert_eq!(config.processing.skewness_threshold, 1.0);
        assert_eq!(config.processing.unseen_policy, UnseenPolicy::GroupToOther);
        assert_eq!(
            config.processing.missing_numeric_policy,
            MissingNumericPolicy::Error
        );
    }

    #[test]
    fn test_builder_pattern() {
        let config = ProcessingConfig::default()
            .with_rare_threshold(100)
            .with_skewness_threshold(0.5)
            .with_top_features(5);

        assert_eq!(config.rare_threshold, 100);
        assert_eq!(config.skewness_threshold, 0.5);
        assert_eq!(config.no_of_top_features, 5);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "processing:\n  rare_threshold: 50\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.processing.rare_threshold, 50);
        assert_eq!(config.processing.top_n, 3);
        assert_eq!(config.training.cv_folds, 5);
    }
}
