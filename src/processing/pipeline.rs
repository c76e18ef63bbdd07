//! Processing pipeline orchestration
//!
//! Training mode walks LOAD -> CLEAN -> FIT_TRANSFORM -> FIT_SELECT ->
//! APPLY_SELECT -> PERSIST; any stage failure aborts the run before anything
//! is written, so no partial artifacts are ever published. Inference mode
//! loads the persisted artifacts once and replays CLEAN -> TRANSFORM ->
//! SELECT per record.

use super::selection::{FeatureSelector, SelectedFeatures};
use super::{columns_to_matrix, ColumnTransform, FeaturePreprocessor};
use crate::config::{MissingNumericPolicy, ProcessingConfig};
use crate::error::{PredictError, Result};
use crate::schema::{encode_label, BookingRecord, ID_COLUMN, LABEL_COLUMN};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Summary of a completed processing run
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub transformed_width: usize,
    pub selected_columns: Vec<String>,
}

/// Batch feature-processing orchestration for training
pub struct ProcessingPipeline {
    config: ProcessingConfig,
}

impl ProcessingPipeline {
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    /// Run the training-mode state machine over the ingested splits
    pub fn run(&self, train_path: &str, test_path: &str) -> Result<ProcessingReport> {
        info!(train_path, test_path, "starting processing pipeline");

        // LOAD
        let train_raw = load_csv(train_path)?;
        let test_raw = load_csv(test_path)?;
        info!(
            train_rows = train_raw.height(),
            test_rows = test_raw.height(),
            "loaded raw splits"
        );

        // CLEAN
        let train_df = clean(&train_raw)?;
        let test_df = clean(&test_raw)?;

        let (x_train, y_train) = split_label(&train_df)?;
        let (x_test, y_test) = split_label(&test_df)?;

        // FIT_TRANSFORM: fit on the training split only
        let mut preprocessor = FeaturePreprocessor::from_config(&self.config);
        preprocessor.fit(&x_train)?;
        let train_transformed = preprocessor.transform(&x_train)?;
        let test_transformed = preprocessor.transform(&x_test)?;
        info!(
            width = preprocessor.output_schema().len(),
            "transformed features"
        );

        let schema: Vec<String> = preprocessor.output_schema().to_vec();
        let train_matrix = columns_to_matrix(&train_transformed, &schema)?;
        let test_matrix = columns_to_matrix(&test_transformed, &schema)?;

        // FIT_SELECT: rank on transformed training data
        let mut selector =
            FeatureSelector::new(self.config.no_of_top_features, self.config.random_seed);
        let selected = selector.fit(&train_matrix, &y_train, &schema)?;

        // APPLY_SELECT: same named mask on both matrices
        let train_selected = selected.apply(&train_matrix, &schema)?;
        let test_selected = selected.apply(&test_matrix, &schema)?;

        // PERSIST: nothing is written until every stage has succeeded
        write_processed(
            &train_selected,
            &y_train,
            selected.columns(),
            &self.config.proc_train_file,
        )?;
        write_processed(
            &test_selected,
            &y_test,
            selected.columns(),
            &self.config.proc_test_file,
        )?;
        preprocessor.save(self.config.preprocessor_path())?;
        selected.save(self.config.selection_path())?;
        info!(
            train_file = %self.config.proc_train_file,
            test_file = %self.config.proc_test_file,
            "persisted processed datasets and fitted artifacts"
        );

        Ok(ProcessingReport {
            train_rows: train_selected.nrows(),
            test_rows: test_selected.nrows(),
            transformed_width: schema.len(),
            selected_columns: selected.columns().to_vec(),
        })
    }
}

/// Fitted artifacts loaded read-only for inference
#[derive(Debug)]
pub struct FittedPipeline {
    config: ProcessingConfig,
    preprocessor: FeaturePreprocessor,
    selection: SelectedFeatures,
}

impl FittedPipeline {
    /// Load the persisted preprocessor and selection of one training run
    pub fn load(config: ProcessingConfig) -> Result<Self> {
        let preprocessor = FeaturePreprocessor::load(config.preprocessor_path())?;
        let selection = SelectedFeatures::load(config.selection_path())?;
        // Artifact pairing check: every selected name must resolve
        selection.resolve(preprocessor.output_schema())?;
        Ok(Self {
            config,
            preprocessor,
            selection,
        })
    }

    /// Width of the matrix the pipeline produces
    pub fn output_width(&self) -> usize {
        self.selection.columns().len()
    }

    /// Run CLEAN -> TRANSFORM -> SELECT over a raw feature table
    pub fn process_table(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let cleaned = clean(df)?;
        let patched = self.apply_missing_numeric_policy(&cleaned)?;
        let transformed = self.preprocessor.transform(&patched)?;
        self.selection
            .apply_df(&transformed, self.preprocessor.output_schema())
    }

    /// Process a single reservation record into the model's input vector
    pub fn process_record(&self, record: &BookingRecord) -> Result<Array2<f64>> {
        let df = record.to_dataframe()?;
        self.process_table(&df)
    }

    /// Numeric columns absent from the input are either rejected or
    /// zero-filled, per the configured policy.
    fn apply_missing_numeric_policy(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for col_name in &self.config.numerical_columns {
            if df.column(col_name).is_ok() {
                continue;
            }
            match self.config.missing_numeric_policy {
                MissingNumericPolicy::Error => {
                    return Err(PredictError::Schema(format!(
                        "missing numeric column: {col_name}"
                    )));
                }
                MissingNumericPolicy::Zero => {
                    let zeros = vec![0.0f64; df.height()];
                    result = result
                        .with_column(Series::new(col_name.as_str().into(), zeros))
                        .map_err(|e| PredictError::Data(e.to_string()))?
                        .clone();
                }
            }
        }
        Ok(result)
    }
}

/// Load a CSV with a header row
pub fn load_csv(path: &str) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| PredictError::Data(format!("cannot open {path}: {e}")))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| PredictError::Data(e.to_string()))
}

/// Load a processed split CSV and separate its encoded label column
pub fn load_processed_split(path: &str) -> Result<(DataFrame, Array1<f64>)> {
    let df = load_csv(path)?;
    split_label(&df)
}

/// Drop the booking identifier (if present) and exact-duplicate rows
fn clean(df: &DataFrame) -> Result<DataFrame> {
    let mut result = df.clone();
    if result.column(ID_COLUMN).is_ok() {
        result = result
            .drop(ID_COLUMN)
            .map_err(|e| PredictError::Data(e.to_string()))?;
    }
    result = result
        .unique_stable(None, UniqueKeepStrategy::First, None)
        .map_err(|e| PredictError::Data(e.to_string()))?;
    Ok(result)
}

/// Split a cleaned table into features and the encoded {0,1} label
fn split_label(df: &DataFrame) -> Result<(DataFrame, Array1<f64>)> {
    let label = df
        .column(LABEL_COLUMN)
        .map_err(|_| PredictError::Schema(format!("missing label column: {LABEL_COLUMN}")))?;

    let y: Vec<f64> = if let Ok(ca) = label.str() {
        ca.into_iter()
            .map(|opt| {
                let raw = opt.ok_or_else(|| {
                    PredictError::Schema("null booking_status value".to_string())
                })?;
                Ok(encode_label(raw)? as f64)
            })
            .collect::<Result<Vec<f64>>>()?
    } else {
        let casted = label
            .cast(&DataType::Float64)
            .map_err(|_| PredictError::Schema("booking_status is not encodable".to_string()))?;
        casted
            .f64()
            .map_err(|e| PredictError::Data(e.to_string()))?
            .into_iter()
            .map(|opt| {
                let v = opt.ok_or_else(|| {
                    PredictError::Schema("null booking_status value".to_string())
                })?;
                if v == 0.0 || v == 1.0 {
                    Ok(v)
                } else {
                    Err(PredictError::Schema(format!(
                        "booking_status out of {{0,1}}: {v}"
                    )))
                }
            })
            .collect::<Result<Vec<f64>>>()?
    };

    let features = df
        .drop(LABEL_COLUMN)
        .map_err(|e| PredictError::Data(e.to_string()))?;
    Ok((features, Array1::from_vec(y)))
}

/// Write a selected matrix plus its label column as a headered CSV
fn write_processed(
    x: &Array2<f64>,
    y: &Array1<f64>,
    columns: &[String],
    path: &str,
) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PredictError::Shape {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{}", y.len()),
        });
    }

    let mut cols: Vec<Column> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<f64> = x.column(idx).to_vec();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    let labels: Vec<i64> = y.iter().map(|&v| v as i64).collect();
    cols.push(Column::new(LABEL_COLUMN.into(), labels));

    let mut out = DataFrame::new(cols).map_err(|e| PredictError::Data(e.to_string()))?;

    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)
        .map_err(|e| PredictError::Data(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_id_and_duplicates() {
        let df = df!(
            "Booking_ID" => &["B1", "B2", "B3"],
            "lead_time" => &[10i64, 10, 20],
            "segment" => &["Online", "Online", "Offline"],
        )
        .unwrap();

        let cleaned = clean(&df).unwrap();
        assert!(cleaned.column("Booking_ID").is_err());
        // Rows 1 and 2 become identical once the identifier is gone
        assert_eq!(cleaned.height(), 2);
    }

    #[test]
    fn test_split_label_encodes_classes() {
        let df = df!(
            "lead_time" => &[10i64, 20],
            "booking_status" => &["Not_Canceled", "Canceled"],
        )
        .unwrap();

        let (features, y) = split_label(&df).unwrap();
        assert!(features.column("booking_status").is_err());
        assert_eq!(y.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_split_label_rejects_unknown_class() {
        let df = df!(
            "lead_time" => &[10i64],
            "booking_status" => &["Perhaps"],
        )
        .unwrap();
        assert!(matches!(
            split_label(&df).unwrap_err(),
            PredictError::Schema(_)
        ));
    }

    #[test]
    fn test_split_label_missing_column() {
        let df = df!("lead_time" => &[10i64]).unwrap();
        assert!(matches!(
            split_label(&df).unwrap_err(),
            PredictError::Schema(_)
        ));
    }
}
