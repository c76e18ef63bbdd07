//! Classification models and training
//!
//! A CART decision tree and a bagged random forest (majority vote,
//! importance scores), evaluation metrics, and the trainer that tunes and
//! publishes the served model.

mod decision_tree;
mod metrics;
mod random_forest;
mod trainer;

pub use decision_tree::{Criterion, DecisionTree};
pub use metrics::ClassificationMetrics;
pub use random_forest::{ForestParams, RandomForest};
pub use trainer::{ModelTrainer, TrainingOutcome};
