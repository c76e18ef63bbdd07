//! Object-storage collaborator interface
//!
//! The pipeline consumes object storage through the [`BlobStore`] trait:
//! GET with existence check and empty-download detection, and PUT. The
//! filesystem implementation backs local runs and tests; deployments
//! substitute their own transport behind the same trait.

use crate::error::{PredictError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Object-storage access: bucket + key addressing, whole-object transfer
pub trait BlobStore: Send + Sync {
    /// Whether the object exists
    fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Fetch an object into a local file. Fails if the object is missing
    /// or the transferred payload is empty.
    fn get(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// Upload a local file as an object
    fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()>;
}

/// Filesystem-backed object store: buckets are directories under a root
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl BlobStore for FsBlobStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.object_path(bucket, key).is_file())
    }

    fn get(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let object = self.object_path(bucket, key);
        if !object.is_file() {
            return Err(PredictError::Storage(format!(
                "object not found: {bucket}/{key}"
            )));
        }

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&object, local_path)?;

        let size = fs::metadata(local_path)?.len();
        if size == 0 {
            return Err(PredictError::Storage(format!(
                "downloaded object is empty: {bucket}/{key}"
            )));
        }

        info!(bucket, key, bytes = size, "fetched object");
        Ok(())
    }

    fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        if !local_path.is_file() {
            return Err(PredictError::Storage(format!(
                "local file not found: {}",
                local_path.display()
            )));
        }

        let object = self.object_path(bucket, key);
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local_path, &object)?;

        info!(bucket, key, "uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("staysense_store_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_put_get_roundtrip() {
        let root = temp_root("roundtrip");
        let store = FsBlobStore::new(root.join("remote"));

        let local = root.join("upload.csv");
        fs::write(&local, "a,b\n1,2\n").unwrap();

        store.put(&local, "bucket", "data/upload.csv").unwrap();
        assert!(store.exists("bucket", "data/upload.csv").unwrap());

        let fetched = root.join("fetched.csv");
        store.get("bucket", "data/upload.csv", &fetched).unwrap();
        assert_eq!(fs::read_to_string(&fetched).unwrap(), "a,b\n1,2\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_get_missing_object() {
        let root = temp_root("missing");
        let store = FsBlobStore::new(root.join("remote"));

        let err = store
            .get("bucket", "nope.csv", &root.join("out.csv"))
            .unwrap_err();
        assert!(matches!(err, PredictError::Storage(_)));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_get_empty_object_rejected() {
        let root = temp_root("empty");
        let store = FsBlobStore::new(root.join("remote"));

        let local = root.join("empty.csv");
        fs::write(&local, "").unwrap();
        let object = root.join("remote/bucket/empty.csv");
        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, "").unwrap();

        let err = store
            .get("bucket", "empty.csv", &root.join("out.csv"))
            .unwrap_err();
        assert!(matches!(err, PredictError::Storage(_)));

        let _ = fs::remove_dir_all(&root);
    }
}
