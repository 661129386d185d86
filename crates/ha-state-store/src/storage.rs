//! Versioned JSON persistence in the `.storage/` directory

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported version {found} for {key}, expected {expected}")]
    UnsupportedVersion {
        key: String,
        expected: u32,
        found: u32,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// On-disk envelope:
///
/// ```json
/// { "version": 1, "minor_version": 1, "key": "core.restore_state", "data": ... }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    pub version: u32,
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T, version: u32, minor_version: u32) -> Self {
        Self {
            version,
            minor_version,
            key: key.into(),
            data,
        }
    }
}

/// Handle on the `.storage/` directory below a config directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Load a storage file, `None` when it does not exist
    ///
    /// A file whose major version differs from `expected_version` is
    /// rejected rather than misread.
    pub async fn load<T>(
        &self,
        key: &str,
        expected_version: u32,
    ) -> StorageResult<Option<StorageFile<T>>>
    where
        T: DeserializeOwned,
    {
        let path = self.file_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage file not found: {}", key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: StorageFile<T> = serde_json::from_str(&content)?;
        if file.version != expected_version {
            warn!(
                "Storage {} has version {}, expected {}",
                key, file.version, expected_version
            );
            return Err(StorageError::UnsupportedVersion {
                key: key.to_string(),
                expected: expected_version,
                found: file.version,
            });
        }

        debug!(
            "Loaded storage file: {} (v{}.{})",
            key, file.version, file.minor_version
        );
        Ok(Some(file))
    }

    /// Save a storage file through a temp file and rename
    pub async fn save<T>(&self, file: &StorageFile<T>) -> StorageResult<()>
    where
        T: Serialize,
    {
        fs::create_dir_all(&self.storage_dir).await?;

        let path = self.file_path(&file.key);
        let temp_path = self.file_path(&format!("{}.tmp", file.key));

        let content = serde_json::to_string_pretty(file)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(
            "Saved storage file: {} (v{}.{})",
            file.key, file.version, file.minor_version
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Selected {
        profile: u8,
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let file = StorageFile::new("test.selected", Selected { profile: 3 }, 1, 2);
        storage.save(&file).await.unwrap();
        assert!(dir.path().join(".storage/test.selected").exists());
        assert!(!dir.path().join(".storage/test.selected.tmp").exists());

        let loaded: StorageFile<Selected> =
            storage.load("test.selected", 1).await.unwrap().unwrap();
        assert_eq!(loaded.data, Selected { profile: 3 });
        assert_eq!(loaded.minor_version, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let loaded: Option<StorageFile<Selected>> = storage.load("absent", 1).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        storage
            .save(&StorageFile::new("test.v2", Selected { profile: 1 }, 2, 1))
            .await
            .unwrap();

        let result = storage.load::<Selected>("test.v2", 1).await;
        assert!(matches!(
            result,
            Err(StorageError::UnsupportedVersion { found: 2, .. })
        ));
    }
}
