//! Staysense - hotel booking cancellation prediction engine
//!
//! An end-to-end pipeline from raw reservation data to a served binary
//! prediction:
//!
//! - [`ingestion`] - fetch the raw dataset from object storage, split it
//!   into train/test sets
//! - [`processing`] - clean, encode, de-skew, and select features with a
//!   fitted, replayable preprocessor
//! - [`model`] - random-forest classifier, tuning, evaluation, publication
//! - [`serving`] - a thin web form over the published artifacts
//!
//! Supporting modules: [`config`] (YAML settings), [`storage`] (the
//! object-store collaborator interface), [`tracking`] (experiment runs),
//! [`schema`] (the raw record contract), and [`error`].

pub mod error;

pub mod config;
pub mod schema;
pub mod storage;

pub mod ingestion;
pub mod processing;
pub mod model;
pub mod tracking;

pub mod serving;

pub use config::AppConfig;
pub use error::{PredictError, Result};
