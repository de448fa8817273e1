//! On-disk cache storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! <sha256(bucket name)>/
//!     manifest.json    bucket name, creation time, request + response metadata
//!     <uuid>.body      one file per stored response body
//! ```
//!
//! Bodies are written first; the manifest is written last through a `.part`
//! file and a rename. A directory without a manifest is not a bucket, so an
//! interrupted population never shows up as a complete one. A failed commit
//! removes what it wrote, and [`CacheStorage::prune`] sweeps directories left
//! behind by a crash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CacheEntry, CacheStorage};
use crate::error::Result;
use crate::fs::{FileSystem, TokioFileSystem, write_atomic};
use crate::http::{Request, Response};

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    name: String,
    created: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    request: Request,
    response: Response,
    body: String,
}

impl StoredEntry {
    fn to_entry(&self) -> CacheEntry {
        CacheEntry {
            request: self.request.clone(),
            response: self.response.clone(),
        }
    }
}

/// Cache storage persisted in a directory.
pub struct DiskCacheStorage<F: FileSystem = TokioFileSystem> {
    root: PathBuf,
    fs: F,
}

impl DiskCacheStorage<TokioFileSystem> {
    /// Creates a storage area rooted at `root` using the default file system.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fs: TokioFileSystem,
        }
    }
}

impl<F: FileSystem> DiskCacheStorage<F> {
    /// Creates a storage area with a custom file system implementation.
    #[must_use]
    pub fn with_fs(root: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Root directory of this storage area.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> PathBuf {
        self.root.join(format!("{:x}", Sha256::digest(name.as_bytes())))
    }

    async fn read_manifest(&self, dir: &Path) -> Result<Option<Manifest>> {
        let path = dir.join(MANIFEST);
        if !self.fs.file_exists(&path).await {
            return Ok(None);
        }
        let raw = self.fs.read_file(&path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn load(&self, name: &str) -> Result<Option<Manifest>> {
        let manifest = self.read_manifest(&self.bucket_dir(name)).await?;
        // Digest collisions are not expected, but never serve another bucket.
        Ok(manifest.filter(|m| m.name == name))
    }
}

#[async_trait]
impl<F: FileSystem> CacheStorage for DiskCacheStorage<F> {
    async fn keys(&self) -> Result<Vec<String>> {
        let mut manifests = Vec::new();
        for dir in self.fs.list_dirs(&self.root).await? {
            match self.read_manifest(&dir).await {
                Ok(Some(manifest)) => manifests.push((manifest.created, manifest.name)),
                Ok(None) => log::debug!("Skipping incomplete bucket {}", dir.display()),
                Err(e) => log::warn!("Unreadable bucket {}: {e}", dir.display()),
            }
        }
        manifests.sort();
        Ok(manifests.into_iter().map(|(_, name)| name).collect())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.load(name).await?.is_some())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.bucket_dir(name);
        let existed = self.load(name).await?.is_some();
        if self.fs.file_exists(&dir).await {
            self.fs.remove_dir_all(&dir).await?;
        }
        Ok(existed)
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>> {
        let Some(manifest) = self.load(name).await? else {
            return Ok(None);
        };
        let Some(stored) = manifest
            .entries
            .iter()
            .find(|stored| stored.to_entry().matches(request))
        else {
            return Ok(None);
        };
        let body = self
            .fs
            .read_file(&self.bucket_dir(name).join(&stored.body))
            .await?;
        let mut response = stored.response.clone();
        response.body = Bytes::from(body);
        Ok(Some(response))
    }

    async fn requests(&self, name: &str) -> Result<Vec<Request>> {
        Ok(self
            .load(name)
            .await?
            .map(|m| m.entries.into_iter().map(|e| e.request).collect())
            .unwrap_or_default())
    }

    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<()> {
        let dir = self.bucket_dir(name);
        let existing = self.load(name).await?;
        let is_new = existing.is_none();
        self.fs.create_dir_all(&dir).await?;

        let mut manifest = existing.unwrap_or_else(|| Manifest {
            name: name.to_string(),
            created: Utc::now(),
            entries: Vec::new(),
        });

        let mut written = Vec::new();
        let replaced = match self.commit(&dir, &mut manifest, entries, &mut written).await {
            Ok(replaced) => replaced,
            Err(e) => {
                self.discard(&dir, &written, is_new).await;
                return Err(e);
            }
        };

        for body in replaced {
            let _ = self.fs.remove_file(&dir.join(body)).await;
        }
        log::debug!(
            "Committed {} entries to bucket {name}",
            manifest.entries.len()
        );
        Ok(())
    }

    async fn prune(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in self.fs.list_dirs(&self.root).await? {
            let reason = match self.read_manifest(&dir).await {
                Ok(Some(_)) => continue,
                Ok(None) => "no manifest".to_string(),
                Err(e) => e.to_string(),
            };
            log::info!("Removing incomplete bucket {} ({reason})", dir.display());
            self.fs.remove_dir_all(&dir).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl<F: FileSystem> DiskCacheStorage<F> {
    /// Writes bodies, then the manifest. Returns the body files superseded by
    /// the new entries; `written` collects every body file created.
    async fn commit(
        &self,
        dir: &Path,
        manifest: &mut Manifest,
        entries: Vec<CacheEntry>,
        written: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let mut replaced = Vec::new();
        for entry in entries {
            let body = format!("{}.body", uuid::Uuid::new_v4());
            write_atomic(&self.fs, &dir.join(&body), &entry.response.body).await?;
            written.push(body.clone());

            let key = entry.request.cache_key();
            manifest.entries.retain(|stored| {
                let keep = stored.request.cache_key() != key;
                if !keep {
                    replaced.push(stored.body.clone());
                }
                keep
            });
            manifest.entries.push(StoredEntry {
                request: entry.request,
                response: entry.response,
                body,
            });
        }

        let raw = serde_json::to_vec_pretty(&*manifest)?;
        write_atomic(&self.fs, &dir.join(MANIFEST), &raw).await?;
        Ok(replaced)
    }

    /// Undoes a failed commit: drops a new bucket directory entirely, or only
    /// the bodies written for an existing bucket.
    async fn discard(&self, dir: &Path, written: &[String], is_new: bool) {
        if is_new {
            if let Err(e) = self.fs.remove_dir_all(dir).await {
                log::warn!("Failed to remove {}: {e}", dir.display());
            }
            return;
        }
        for body in written {
            let _ = self.fs.remove_file(&dir.join(body)).await;
        }
    }
}
