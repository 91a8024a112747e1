use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Store;

/// In-process store, used by tests and for throwaway ledgers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn write_batch(&self, entries: Vec<(String, Vec<u8>)>, removals: &[&str]) -> Result<()> {
        let mut guard = self.entries.lock().await;
        for (key, value) in entries {
            guard.insert(key, value);
        }
        for key in removals {
            guard.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_remove() -> Result<()> {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await?, None);

        store.set("a", b"1".to_vec()).await?;
        store
            .set_many(vec![("b".into(), b"2".to_vec()), ("c".into(), b"3".to_vec())])
            .await?;
        assert_eq!(store.get("a").await?, Some(b"1".to_vec()));
        assert_eq!(store.len().await, 3);

        store.remove_many(&["a", "c", "missing"]).await?;
        assert_eq!(store.get("a").await?, None);
        assert_eq!(store.get("b").await?, Some(b"2".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_batch_sets_and_removes() -> Result<()> {
        let store = MemoryStore::new();
        store
            .set_many(vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())])
            .await?;

        store
            .write_batch(vec![("a".into(), b"9".to_vec())], &["b"])
            .await?;
        assert_eq!(store.get("a").await?, Some(b"9".to_vec()));
        assert_eq!(store.get("b").await?, None);
        assert_eq!(store.len().await, 1);
        Ok(())
    }
}
