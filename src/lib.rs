//! hustle - offline cache lifecycle and platform capabilities for the HustleOS web app.
//!
//! This library provides the two pieces of plumbing the app needs around its
//! UI, abstracted from any specific host:
//!
//! - [`ServiceWorker`]: pre-populates a versioned cache bucket, removes stale
//!   generations on activation and serves requests cache-first.
//! - [`CapabilityAdapter`]: one surface for notification permission, screen
//!   wake lock, alarm notifications and battery optimization, whether the app
//!   runs in a browser tab or inside the native wrapper.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hustle::{CacheConfig, DiskCacheStorage, HttpNetwork, PageClients, ServiceWorker};
//!
//! # async fn example() -> hustle::Result<()> {
//! let config = CacheConfig::default().with_origin("https://hustle.example/");
//! let worker = ServiceWorker::new(
//!     &config,
//!     Arc::new(DiskCacheStorage::new(config.cache_dir())),
//!     Arc::new(HttpNetwork::new()?),
//!     Arc::new(PageClients::new()),
//! )?;
//!
//! worker.install().await?;
//! worker.activate().await?;
//!
//! let request = hustle::Request::get(worker.resolve("./index.html")?);
//! let outcome = worker.handle_fetch(&request).await?;
//! println!("{} bytes from {:?}", outcome.response.body.len(), outcome.source);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod adapter;
pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod network;
pub mod worker;

// Re-export main types for convenience
pub use adapter::{AlarmOutcome, CapabilityAdapter, Platform};
pub use cache::{CacheEntry, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use clients::{Clients, PageClients};
pub use config::{AdapterConfig, AppConfig, CacheConfig};
pub use error::{CapabilityError, Error, Result};
pub use fs::{FileSystem, TokioFileSystem};
pub use http::{Request, Response};
pub use network::{HttpNetwork, Network};
pub use worker::{FetchOutcome, ResponseSource, ServiceWorker, WorkerState};
