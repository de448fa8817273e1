//! In-memory cache storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheStorage, merge_entries};
use crate::error::Result;
use crate::http::{Request, Response};

/// Cache storage kept entirely in memory. Buckets keep their creation order.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    buckets: RwLock<Vec<(String, Vec<CacheEntry>)>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage area.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.buckets.read().await.iter().any(|(n, _)| n == name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|(n, _)| n != name);
        Ok(buckets.len() != before)
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.iter().find(|e| e.matches(request)))
            .map(|e| e.response.clone()))
    }

    async fn requests(&self, name: &str) -> Result<Vec<Request>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.iter().map(|e| e.request.clone()).collect())
            .unwrap_or_default())
    }

    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        if let Some((_, existing)) = buckets.iter_mut().find(|(n, _)| n == name) {
            merge_entries(existing, entries);
        } else {
            let mut fresh = Vec::new();
            merge_entries(&mut fresh, entries);
            buckets.push((name.to_string(), fresh));
        }
        Ok(())
    }
}
