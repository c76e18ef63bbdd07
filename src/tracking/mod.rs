//! Experiment run tracking
//!
//! A training run records its parameters, scalar metrics, and artifact
//! paths; the store persists each run as a JSON document on disk. This is
//! the metrics/experiment sink the trainer logs into.

use crate::error::{PredictError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// One training run: parameters in, metrics and artifacts out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

impl Run {
    /// Start a new named run
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string()[..8].to_string(),
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Record a named parameter
    pub fn log_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }

    /// Record a named scalar metric
    pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
        self.metrics.insert(key.into(), value);
    }

    /// Record scalar metrics in bulk
    pub fn log_metrics(&mut self, metrics: impl IntoIterator<Item = (String, f64)>) {
        for (key, value) in metrics {
            self.metrics.insert(key, value);
        }
    }

    /// Attach an artifact path
    pub fn add_artifact(&mut self, path: impl Into<String>) {
        self.artifacts.push(path.into());
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.status = RunStatus::Finished;
        self.ended_at = Some(Utc::now());
    }

    /// Mark the run failed
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.ended_at = Some(Utc::now());
    }
}

/// File-backed run store: one JSON document per run
pub struct RunStore {
    base_dir: PathBuf,
}

impl RunStore {
    /// Create a store under the given directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Persist a run record
    pub fn save(&self, run: &Run) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let json = serde_json::to_string_pretty(run)?;
        fs::write(self.run_path(&run.run_id), json)?;
        Ok(())
    }

    /// Load a run record by id
    pub fn load(&self, run_id: &str) -> Result<Run> {
        let path = self.run_path(run_id);
        let json = fs::read_to_string(&path).map_err(|e| {
            PredictError::Artifact(format!("cannot read run {}: {}", path.display(), e))
        })?;
        let run: Run = serde_json::from_str(&json)
            .map_err(|e| PredictError::Artifact(format!("corrupt run record: {e}")))?;
        Ok(run)
    }

    /// Load every run in the store
    pub fn list(&self) -> Result<Vec<Run>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path)?;
                if let Ok(run) = serde_json::from_str::<Run>(&json) {
                    runs.push(run);
                }
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(runs)
    }
}
