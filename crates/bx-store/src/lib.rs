use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Client-side session persistence. The only durable fact is whether the
/// wallet was connected, consulted to decide a silent auto-reconnect on
/// the next load.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn was_connected(&self) -> Result<bool>;
    async fn set_was_connected(&self, connected: bool) -> Result<()>;
}

#[derive(Default)]
pub struct NoopStore;

#[async_trait]
impl SessionStore for NoopStore {
    async fn was_connected(&self) -> Result<bool> {
        Ok(false)
    }

    async fn set_was_connected(&self, _connected: bool) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    connected: RwLock<bool>,
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn was_connected(&self) -> Result<bool> {
        Ok(*self.connected.read().await)
    }

    async fn set_was_connected(&self, connected: bool) -> Result<()> {
        *self.connected.write().await = connected;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionRecord {
    was_connected: bool,
}

/// JSON-file-backed store. A missing file reads as "never connected".
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads `BX_SESSION_FILE` from the environment
    /// (default: `bookchain-session.json`).
    pub fn open_default() -> Self {
        let path = std::env::var("BX_SESSION_FILE")
            .unwrap_or_else(|_| "bookchain-session.json".to_string());
        Self::open(path)
    }

    fn read_record(&self) -> Result<SessionRecord> {
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(SessionRecord::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn was_connected(&self) -> Result<bool> {
        Ok(self.read_record()?.was_connected)
    }

    async fn set_was_connected(&self, connected: bool) -> Result<()> {
        let record = SessionRecord {
            was_connected: connected,
        };
        std::fs::write(&self.path, serde_json::to_vec(&record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_never_connected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("session.json"));
        assert!(!store.was_connected().await.unwrap());
    }

    #[tokio::test]
    async fn flag_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path);
        store.set_was_connected(true).await.unwrap();
        assert!(store.was_connected().await.unwrap());

        // A fresh handle sees the persisted flag.
        let reopened = FileStore::open(&path);
        assert!(reopened.was_connected().await.unwrap());

        reopened.set_was_connected(false).await.unwrap();
        assert!(!store.was_connected().await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryStore::default();
        assert!(!store.was_connected().await.unwrap());
        store.set_was_connected(true).await.unwrap();
        assert!(store.was_connected().await.unwrap());
    }
}
