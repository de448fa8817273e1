//! Service worker cache lifecycle: install, activate, fetch.
//!
//! The worker owns one cache bucket named after the deployed generation.
//! Install pre-populates it all-or-nothing, activate deletes every other
//! bucket before taking control of open pages, and fetch serves cache-first
//! with a network fallback that is never written back.

use std::sync::Arc;

use futures::future::try_join_all;
use futures::{StreamExt, stream};
use tokio::sync::watch;
use url::Url;

use crate::cache::{CacheEntry, CacheStorage};
use crate::clients::Clients;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::network::Network;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, no lifecycle event handled yet.
    Parsed,
    /// Install in progress.
    Installing,
    /// Bucket populated; ready to activate.
    Installed,
    /// Activation in progress.
    Activating,
    /// Controlling pages and serving fetches.
    Activated,
    /// Install failed; this worker will never activate.
    Redundant,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Number of responses committed to the bucket.
    pub cached: usize,
    /// The worker asks to activate without waiting for older workers.
    pub skip_waiting: bool,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Stale buckets that were deleted.
    pub deleted: Vec<String>,
    /// Pages whose controller changed to this worker.
    pub claimed: usize,
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Served from the current bucket.
    Cache,
    /// Fetched live from the network.
    Network,
}

/// Response to an intercepted fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The response handed back to the page.
    pub response: Response,
    /// Where it came from.
    pub source: ResponseSource,
}

/// Cache lifecycle manager for one cache generation.
pub struct ServiceWorker {
    generation: String,
    scope: Url,
    precache: Vec<Url>,
    install_concurrency: usize,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    state: watch::Sender<WorkerState>,
}

impl ServiceWorker {
    /// Creates a worker for the configured generation.
    ///
    /// Relative precache URLs are resolved against the configured origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin or any precache URL is invalid.
    pub fn new(
        config: &CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
    ) -> Result<Self> {
        let scope = Url::parse(&config.origin)?;
        let precache = config
            .precache
            .iter()
            .map(|url| scope.join(url))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self {
            generation: config.generation.clone(),
            scope,
            precache,
            install_concurrency: config.install_concurrency.max(1),
            storage,
            network,
            clients,
            state,
        })
    }

    /// Name of the bucket this worker owns.
    #[must_use]
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Origin the worker serves.
    #[must_use]
    pub const fn scope(&self) -> &Url {
        &self.scope
    }

    /// Absolute URLs fetched at install time.
    #[must_use]
    pub fn precache_urls(&self) -> &[Url] {
        &self.precache
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Resolves a possibly relative URL against the worker's scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        Ok(self.scope.join(url)?)
    }

    fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        log::debug!("Worker {}: {previous:?} -> {state:?}", self.generation);
    }

    /// Moves to `next` only if the current state is one of `from`, as a
    /// single step. Returns the state that was left.
    fn transition(
        &self,
        event: &str,
        from: &[WorkerState],
        next: WorkerState,
    ) -> Result<WorkerState> {
        let mut previous = WorkerState::Parsed;
        let moved = self.state.send_if_modified(|state| {
            previous = *state;
            if from.contains(state) {
                *state = next;
                true
            } else {
                false
            }
        });
        if !moved {
            return Err(Error::InvalidState(format!(
                "cannot {event} from {previous:?}"
            )));
        }
        log::debug!("Worker {}: {previous:?} -> {next:?}", self.generation);
        Ok(previous)
    }

    /// Handles the install event.
    ///
    /// Fetches every precache URL and commits all responses to the bucket in
    /// one write. A transport error or non-success status on any URL fails
    /// the install, commits nothing and marks the worker redundant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precache`] for a failed URL, a storage error if the
    /// commit fails, or [`Error::InvalidState`] if install already ran.
    pub async fn install(&self) -> Result<InstallOutcome> {
        self.transition("install", &[WorkerState::Parsed], WorkerState::Installing)?;
        log::info!(
            "Installing {} ({} resources)",
            self.generation,
            self.precache.len()
        );

        match self.populate().await {
            Ok(cached) => {
                self.set_state(WorkerState::Installed);
                log::info!("Installed {} with {cached} cached resources", self.generation);
                Ok(InstallOutcome {
                    cached,
                    skip_waiting: true,
                })
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                log::error!("Install of {} failed: {e}", self.generation);
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<usize> {
        let fetches: Vec<_> = self
            .precache
            .iter()
            .map(|url| self.precache_one(url))
            .collect();
        let results: Vec<Result<CacheEntry>> = stream::iter(fetches)
            .buffered(self.install_concurrency)
            .collect()
            .await;
        let entries = results.into_iter().collect::<Result<Vec<_>>>()?;
        let cached = entries.len();
        self.storage.put_all(&self.generation, entries).await?;
        Ok(cached)
    }

    async fn precache_one(&self, url: &Url) -> Result<CacheEntry> {
        let request = Request::get(url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| Error::Precache {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(Error::Precache {
                url: url.to_string(),
                reason: Error::BadStatus {
                    url: url.to_string(),
                    status: response.status,
                }
                .to_string(),
            });
        }
        CacheEntry::new(request, response)
    }

    /// Handles the activate event.
    ///
    /// Deletes every bucket except the current generation, along with any
    /// leftovers of interrupted commits, then claims all open pages. Claiming
    /// only starts once every deletion finished.
    ///
    /// Activation is accepted after a successful install, or on a freshly
    /// started worker whose bucket already exists from an earlier install.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the worker is not ready, or the
    /// storage / clients error that interrupted activation.
    pub async fn activate(&self) -> Result<ActivateOutcome> {
        let restarted =
            self.state() == WorkerState::Parsed && self.storage.has(&self.generation).await?;
        let from: &[WorkerState] = if restarted {
            &[WorkerState::Installed, WorkerState::Parsed]
        } else {
            &[WorkerState::Installed]
        };
        let current = self.transition("activate", from, WorkerState::Activating)?;

        match self.collect_and_claim().await {
            Ok(outcome) => {
                self.set_state(WorkerState::Activated);
                log::info!(
                    "Activated {}: deleted {} stale buckets, claimed {} pages",
                    self.generation,
                    outcome.deleted.len(),
                    outcome.claimed
                );
                Ok(outcome)
            }
            Err(e) => {
                self.set_state(current);
                log::error!("Activation of {} failed: {e}", self.generation);
                Err(e)
            }
        }
    }

    async fn collect_and_claim(&self) -> Result<ActivateOutcome> {
        match self.storage.prune().await {
            Ok(0) => {}
            Ok(n) => log::info!("Removed {n} incomplete cache directories"),
            Err(e) => log::warn!("Failed to sweep incomplete caches: {e}"),
        }

        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.generation)
            .collect();

        try_join_all(stale.iter().map(|name| async move {
            log::info!("Deleting stale cache {name}");
            self.storage.delete(name).await
        }))
        .await?;

        let claimed = self.clients.claim(&self.generation).await?;
        Ok(ActivateOutcome {
            deleted: stale,
            claimed,
        })
    }

    /// Handles an intercepted fetch.
    ///
    /// A cached response is returned as stored, without touching the network.
    /// Otherwise exactly one network fetch is made and its response returned
    /// unmodified; it is not added to the cache. A failing cache lookup is
    /// treated as a miss.
    ///
    /// # Errors
    ///
    /// Returns the network error on a miss whose fetch fails.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        match self.storage.match_request(&self.generation, request).await {
            Ok(Some(response)) => {
                log::debug!("Cache hit: {}", request.cache_key());
                return Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Cache,
                });
            }
            Ok(None) => log::debug!("Cache miss: {}", request.cache_key()),
            Err(e) => log::warn!("Cache lookup failed for {}: {e}", request.cache_key()),
        }

        let response = self.network.fetch(request).await?;
        Ok(FetchOutcome {
            response,
            source: ResponseSource::Network,
        })
    }
}
