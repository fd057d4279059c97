//! Long-term fact persistence backends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;

use browzee_core::{traits::FactStore, Error, Result};

/// Platform data directory for memory files, `./memory` when unknown.
pub fn default_memory_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("Browzee").join("Memory"))
        .unwrap_or_else(|| PathBuf::from("memory"))
}

/// One JSON object per user at `<dir>/<user>_long_term_memory.json`.
///
/// Every save rewrites the whole file through a temporary file and a
/// rename, so readers never observe a half-written map. Two processes
/// saving concurrently are last-writer-wins.
pub struct FileFactStore {
    dir: PathBuf,
}

impl FileFactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}_long_term_memory.json", safe))
    }
}

#[async_trait]
impl FactStore for FileFactStore {
    async fn load(&self, user_id: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path_for(user_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read memory file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            Error::storage(format!("Failed to parse memory file {}: {}", path.display(), e))
        })
    }

    async fn save(&self, user_id: &str, facts: &BTreeMap<String, String>) -> Result<()> {
        let path = self.path_for(user_id);
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::storage(format!("Failed to create memory directory: {}", e))
        })?;

        let content = serde_json::to_string_pretty(facts)
            .map_err(|e| Error::storage(format!("Failed to serialize facts: {}", e)))?;

        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::storage(format!("Failed to write memory file: {}", e)))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage(format!("Failed to replace memory file: {}", e)));
        }

        tracing::debug!(user = user_id, facts = facts.len(), path = %path.display(), "Long-term memory saved");
        Ok(())
    }
}

/// In-memory fact store using DashMap for concurrent access.
#[derive(Default)]
pub struct InMemoryFactStore {
    users: DashMap<String, BTreeMap<String, String>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn load(&self, user_id: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .users
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, facts: &BTreeMap<String, String>) -> Result<()> {
        self.users.insert(user_id.to_string(), facts.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFactStore::new(dir.path().join("nested"));

        assert!(store.load("alice").await.unwrap().is_empty());

        let mut facts = BTreeMap::new();
        facts.insert("fact_0".to_string(), "Likes tea".to_string());
        store.save("alice", &facts).await.unwrap();

        assert_eq!(store.load("alice").await.unwrap(), facts);
        assert!(store.path_for("alice").ends_with("alice_long_term_memory.json"));

        // No temp files left behind
        let leftovers = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.path().to_string_lossy().ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFactStore::new(dir.path());
        std::fs::write(store.path_for("bob"), "{not json").unwrap();

        let err = store.load("bob").await.unwrap_err();
        assert!(matches!(err, Error::MemoryPersistence(_)));
    }

    #[test]
    fn test_user_id_is_sanitised() {
        let store = FileFactStore::new("/tmp/x");
        let path = store.path_for("../evil");
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/x"));
    }
}
