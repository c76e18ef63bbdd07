//! Feature processing module
//!
//! The stateful fit/transform stages between raw reservation tables and the
//! numeric matrix the classifier consumes:
//! - Rare-category grouping with a frozen per-column rare set
//! - Top-N indicator encoding of one low-cardinality column
//! - Skewness-adaptive numeric transforms (log1p / Yeo-Johnson)
//! - The composed preprocessor with its ordered output schema
//! - Importance-based feature selection
//! - Pipeline orchestration for training and inference

mod preprocessor;
mod pipeline;
pub mod rare;
pub mod topn;
pub mod skew;
pub mod selection;

pub use preprocessor::FeaturePreprocessor;
pub use pipeline::{load_csv, load_processed_split, FittedPipeline, ProcessingPipeline, ProcessingReport};
pub use rare::RareCategoryGrouper;
pub use topn::TopNEncoder;
pub use skew::{SkewHandler, SkewMethod};
pub use selection::{FeatureSelector, SelectedFeatures};

use crate::error::{PredictError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Common surface of the stateful transformers: learn column state once,
/// then replay it on any table carrying the same columns.
pub trait ColumnTransform {
    /// Learn per-column state from the training split
    fn fit(&mut self, df: &DataFrame) -> Result<()>;

    /// Apply the fitted state, returning a new table. Never mutates input.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`,
/// casting integers as needed.
pub fn columns_to_matrix(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| PredictError::FitState(format!("column not found: {col_name}")))?;
            let series_f64 = series
                .cast(&DataType::Float64)
                .map_err(|e| PredictError::Data(e.to_string()))?;
            let values: Vec<f64> = series_f64
                .f64()
                .map_err(|e| PredictError::Data(e.to_string()))?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_refs[c][r]
    }))
}

/// Read a string column, failing with a schema error on other dtypes
pub(crate) fn str_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| PredictError::FitState(format!("column not found: {name}")))?;
    column
        .str()
        .map_err(|_| PredictError::Schema(format!("column {name} is not categorical")))
}

/// Read a column as f64 values, casting integers as needed
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PredictError::FitState(format!("column not found: {name}")))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|_| PredictError::Schema(format!("column {name} is not numeric")))?;
    Ok(casted
        .f64()
        .map_err(|e| PredictError::Data(e.to_string()))?
        .into_iter()
        .collect())
}
