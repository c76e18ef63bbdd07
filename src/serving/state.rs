//! Serving context
//!
//! One immutable context holds the fitted pipeline and the trained model.
//! It is constructed once at process start, wrapped in an `Arc`, and read
//! by every request handler; nothing mutates after construction, so no
//! locking is needed.

use crate::config::AppConfig;
use crate::error::{PredictError, Result};
use crate::model::RandomForest;
use crate::processing::FittedPipeline;
use crate::schema::BookingRecord;
use tracing::info;

/// Read-only state shared across request handlers
pub struct ServingContext {
    pipeline: FittedPipeline,
    model: RandomForest,
}

impl ServingContext {
    /// Load the fitted artifacts of one training run
    pub fn load(config: &AppConfig) -> Result<Self> {
        let pipeline = FittedPipeline::load(config.processing.clone())?;
        let model = RandomForest::load(&config.training.model_output_path)?;

        // The model and the pipeline must come from the same run
        if model.n_features() != pipeline.output_width() {
            return Err(PredictError::Artifact(format!(
                "model expects {} features but pipeline produces {}",
                model.n_features(),
                pipeline.output_width()
            )));
        }

        info!(
            features = pipeline.output_width(),
            trees = model.n_trees(),
            "loaded serving artifacts"
        );
        Ok(Self { pipeline, model })
    }

    /// Predict the cancellation class {0, 1} for one reservation record
    pub fn predict(&self, record: &BookingRecord) -> Result<i64> {
        let x = self.pipeline.process_record(record)?;
        let prediction = self.model.predict(&x)?;
        Ok(prediction[0].round() as i64)
    }
}
