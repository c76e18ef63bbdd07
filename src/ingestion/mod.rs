//! Data ingestion
//!
//! Fetches the raw reservation dataset from object storage (with a local
//! cache short-circuit), loads it, and splits it into train/test CSVs with
//! a seeded shuffle.

use crate::config::IngestionConfig;
use crate::error::{PredictError, Result};
use crate::processing::load_csv;
use crate::storage::BlobStore;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Summary of a completed ingestion run
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub total_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_path: String,
    pub test_path: String,
}

/// Fetches and splits the raw dataset
pub struct DataIngestion {
    config: IngestionConfig,
}

impl DataIngestion {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    /// Ensure the raw file is present locally, fetching it if needed
    pub fn fetch(&self, store: &dyn BlobStore) -> Result<String> {
        let raw_path = self.config.raw_path();
        if Path::new(&raw_path).is_file() {
            info!(path = %raw_path, "using cached raw file");
            return Ok(raw_path);
        }

        info!(
            bucket = %self.config.bucket,
            key = %self.config.key,
            "fetching raw dataset from object storage"
        );
        store.get(&self.config.bucket, &self.config.key, Path::new(&raw_path))?;
        Ok(raw_path)
    }

    /// Fetch, load, split, and persist the train/test CSVs
    pub fn run(&self, store: &dyn BlobStore) -> Result<IngestionReport> {
        if !(0.0..1.0).contains(&self.config.train_ratio) || self.config.train_ratio <= 0.0 {
            return Err(PredictError::Config(format!(
                "train_ratio must be in (0, 1), got {}",
                self.config.train_ratio
            )));
        }

        let raw_path = self.fetch(store)?;
        let df = load_csv(&raw_path)?;
        let n = df.height();
        info!(rows = n, columns = df.width(), "loaded raw dataset");
        if n < 2 {
            return Err(PredictError::Data(format!(
                "raw dataset has only {n} rows, cannot split"
            )));
        }

        let (train_df, test_df) = self.split(&df)?;

        let train_path = self.config.train_path();
        let test_path = self.config.test_path();
        write_csv(&train_df, &train_path)?;
        write_csv(&test_df, &test_path)?;
        info!(
            train_rows = train_df.height(),
            test_rows = test_df.height(),
            "wrote train/test splits"
        );

        Ok(IngestionReport {
            total_rows: n,
            train_rows: train_df.height(),
            test_rows: test_df.height(),
            train_path,
            test_path,
        })
    }

    /// Seeded shuffle split preserving every row exactly once
    fn split(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let n = df.height();
        let mut order: Vec<u32> = (0..n as u32).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }

        let train_size = ((n as f64) * self.config.train_ratio).round() as usize;
        let train_size = train_size.clamp(1, n - 1);

        let train_idx = IdxCa::from_vec("idx".into(), order[..train_size].to_vec());
        let test_idx = IdxCa::from_vec("idx".into(), order[train_size..].to_vec());

        let train_df = df.take(&train_idx).map_err(|e| PredictError::Data(e.to_string()))?;
        let test_df = df.take(&test_idx).map_err(|e| PredictError::Data(e.to_string()))?;
        Ok((train_df, test_df))
    }
}

fn write_csv(df: &DataFrame, path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = df.clone();
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
    use crate::storage::FsBlobStore;
    use std::fs;

    fn temp_root(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("staysense_ingest_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn seed_remote_csv(root: &Path) -> FsBlobStore {
        let store = FsBlobStore::new(root.join("remote"));
        let mut rows = String::from("Booking_ID,lead_time,booking_status\n");
        for i in 0..10 {
            let status = if i % 2 == 0 { "Canceled" } else { "Not_Canceled" };
            rows.push_str(&format!("B{i},{},{status}\n", i * 7));
        }
        let local = root.join("seed.csv");
        fs::write(&local, rows).unwrap();
        store.put(&local, "bucket", "raw/data.csv").unwrap();
        store
    }

    fn config(root: &Path) -> IngestionConfig {
        IngestionConfig {
            bucket: "bucket".to_string(),
            key: "raw/data.csv".to_string(),
            raw_data_dir: root.join("data").to_string_lossy().to_string(),
            train_ratio: 0.8,
            random_seed: 42,
        }
    }

    #[test]
    fn test_run_splits_all_rows() {
        let root = temp_root("split");
        let store = seed_remote_csv(&root);

        let ingestion = DataIngestion::new(config(&root));
        let report = ingestion.run(&store).unwrap();

        assert_eq!(report.total_rows, 10);
        assert_eq!(report.train_rows + report.test_rows, 10);
        assert_eq!(report.train_rows, 8);

        let train = load_csv(&report.train_path).unwrap();
        assert_eq!(train.height(), 8);
        assert!(train.column("Booking_ID").is_ok());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_split_is_deterministic() {
        let root = temp_root("deterministic");
        let store = seed_remote_csv(&root);
        let ingestion = DataIngestion::new(config(&root));

        ingestion.run(&store).unwrap();
        let first = fs::read_to_string(ingestion.config.train_path()).unwrap();
        ingestion.run(&store).unwrap();
        let second = fs::read_to_string(ingestion.config.train_path()).unwrap();
        assert_eq!(first, second);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_cached_fetch_skips_store() {
        let root = temp_root("cached");
        let store = seed_remote_csv(&root);
        let ingestion = DataIngestion::new(config(&root));

        let path = ingestion.fetch(&store).unwrap();
        // Second fetch must hit the cache even if the object disappears
        let empty_store = FsBlobStore::new(root.join("gone"));
        let cached = ingestion.fetch(&empty_store).unwrap();
        assert_eq!(path, cached);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let root = temp_root("ratio");
        let store = seed_remote_csv(&root);
        let mut cfg = config(&root);
        cfg.train_ratio = 1.5;

        let err = DataIngestion::new(cfg).run(&store).unwrap_err();
        assert!(matches!(err, PredictError::Config(_)));

        let _ = fs::remove_dir_all(&root);
    }
}
