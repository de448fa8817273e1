//! Named cache buckets holding request/response pairs.
//!
//! A [`CacheStorage`] is the worker's view of the browser's cache storage
//! area: a set of buckets keyed by name, each mapping requests to responses.

mod disk;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::{Request, Response};

pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;

/// A stored request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request the response was stored for.
    pub request: Request,
    /// Stored response.
    pub response: Response,
}

impl CacheEntry {
    /// Creates an entry. Only `GET` requests can be cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for any other method.
    pub fn new(request: Request, response: Response) -> Result<Self> {
        if request.method != "GET" {
            return Err(Error::UnsupportedMethod {
                method: request.method,
            });
        }
        Ok(Self { request, response })
    }

    /// Returns true if `request` is served by this entry.
    ///
    /// Method and URL (without fragment) must be equal, and every header named
    /// in the stored response's `Vary` must carry the same value on both
    /// requests. `Vary: *` never matches.
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        if self.request.cache_key() != request.cache_key() {
            return false;
        }
        let vary = self.response.vary();
        if vary.iter().any(|name| name == "*") {
            return false;
        }
        vary.iter()
            .all(|name| self.request.header(name) == request.header(name))
    }
}

/// Storage area holding named cache buckets.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all complete buckets, oldest first.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Returns true if a complete bucket named `name` exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Deletes a bucket. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Finds the response stored for `request` in bucket `name`.
    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>>;

    /// Requests stored in bucket `name`, empty if the bucket does not exist.
    async fn requests(&self, name: &str) -> Result<Vec<Request>>;

    /// Stores all entries in bucket `name`, creating it if needed.
    ///
    /// Either every entry becomes visible or none does. Entries replace
    /// existing ones with the same cache key.
    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<()>;

    /// Removes leftovers of interrupted writes that never became buckets.
    /// Returns how many were removed.
    async fn prune(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Merges `incoming` into `existing`, replacing entries with the same cache key.
fn merge_entries(existing: &mut Vec<CacheEntry>, incoming: Vec<CacheEntry>) {
    for entry in incoming {
        let key = entry.request.cache_key();
        existing.retain(|e| e.request.cache_key() != key);
        existing.push(entry);
    }
}
