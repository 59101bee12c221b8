use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// One stored page, keyed on `path`. `links_csv` is the filtered outbound
/// link list joined with commas; `level` is the remaining depth budget the
/// page was fetched at.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub client_id: String,
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub links_csv: String,
    pub level: u32,
}

/// Persistent destination for crawled pages. Upsert semantics: writing the
/// same path twice leaves one record carrying the latest content.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn upsert(&self, record: &SiteRecord) -> Result<(), StoreError>;
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SiteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<SiteRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, path: &str) -> Option<SiteRecord> {
        self.records.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn upsert(&self, record: &SiteRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(record.path.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, content: &str) -> SiteRecord {
        SiteRecord {
            client_id: "client-1".to_string(),
            path: path.to_string(),
            title: "Title".to_string(),
            description: None,
            content: content.to_string(),
            links_csv: String::new(),
            level: 2,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_latest_wins() {
        let store = MemoryStore::new();

        store
            .upsert(&record("https://example.com/", "old"))
            .await
            .unwrap();
        store
            .upsert(&record("https://example.com/", "new"))
            .await
            .unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "new");
    }

    #[tokio::test]
    async fn distinct_paths_coexist() {
        let store = MemoryStore::new();

        store
            .upsert(&record("https://example.com/a", "a"))
            .await
            .unwrap();
        store
            .upsert(&record("https://example.com/b", "b"))
            .await
            .unwrap();

        assert_eq!(store.records().await.len(), 2);
        assert_eq!(store.get("https://example.com/a").await.unwrap().content, "a");
    }
}
