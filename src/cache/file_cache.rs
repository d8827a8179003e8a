//! On-disk cache backend: one JSON file per key.
//!
//! Writes go to a uniquely named temporary file that is then renamed over
//! the target, so a cancelled or crashed writer never leaves a half-written
//! entry behind. It can leave the temporary file itself; [`FileCache::open`]
//! removes any such leftovers. Expired entries are removed when read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::cache_handler::CacheLayer;
use crate::utilities::errors::CacheError;

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    /// Expiry as Unix milliseconds.
    expires_at_ms: Option<i64>,
}

/// Cache stored as JSON files under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache rooted at `dir`, removing
    /// temporary files left by interrupted writes.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let cache = Self { dir };
        cache.remove_stale_temp_files().await?;
        Ok(cache)
    }

    async fn remove_stale_temp_files(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => log::debug!("Could not remove {}: {}", path.display(), e),
                }
            }
        }
        if removed > 0 {
            log::info!("Removed {} stale temporary cache file(s) from {}", removed, self.dir.display());
        }
        Ok(removed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl CacheLayer for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&bytes)?;
        if let Some(expires_at_ms) = entry.expires_at_ms {
            if Utc::now().timestamp_millis() >= expires_at_ms {
                log::debug!("Evicting expired cache file {}", path.display());
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    log::debug!("Could not remove {}: {}", path.display(), e);
                }
                return Ok(None);
            }
        }
        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at_ms = ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64);
        let bytes = serde_json::to_vec(&StoredEntry {
            value,
            expires_at_ms,
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_cache_roundtrip_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("cache")).await.unwrap();

        assert_eq!(cache.get("themes:v1-abc").await.unwrap(), None);
        cache
            .set("themes:v1-abc", json!({"material": 0}), None)
            .await
            .unwrap();
        assert_eq!(
            cache.get("themes:v1-abc").await.unwrap(),
            Some(json!({"material": 0}))
        );
        assert!(cache.dir().join("themes_v1-abc.json").exists());
    }

    #[tokio::test]
    async fn test_file_cache_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).await.unwrap();
        cache
            .set("k", json!(1), Some(Duration::from_millis(0)))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.dir().join("k.json").exists());
    }

    #[tokio::test]
    async fn test_file_cache_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).await.unwrap();
        for i in 0..5 {
            cache.set("same", json!(i), None).await.unwrap();
        }
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["same.json".to_string()]);
        assert_eq!(cache.get("same").await.unwrap(), Some(json!(4)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("bad.json"), b"not json").unwrap();
        assert!(matches!(
            cache.get("bad").await,
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_open_removes_interrupted_writes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k.3f2a.tmp"), b"{\"val").unwrap();
        std::fs::write(dir.path().join("k.json"), br#"{"value":1,"expires_at_ms":null}"#).unwrap();

        let cache = FileCache::open(dir.path()).await.unwrap();
        assert!(!dir.path().join("k.3f2a.tmp").exists());
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(1)));
    }
}
