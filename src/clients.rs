//! Open page clients a worker can take control of.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// An open page instance within the worker's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageClient {
    /// Client identifier.
    pub id: Uuid,
    /// URL the page has open.
    pub url: String,
    /// Cache generation of the worker controlling this page, if any.
    pub controller: Option<String>,
}

/// The set of page clients visible to a worker.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Makes `generation` the controller of every open page.
    ///
    /// Returns the number of pages whose controller changed.
    async fn claim(&self, generation: &str) -> Result<usize>;
}

/// In-memory registry of open pages.
#[derive(Debug, Default)]
pub struct PageClients {
    pages: RwLock<Vec<PageClient>>,
}

impl PageClients {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly opened page, optionally already controlled.
    pub async fn open(&self, url: impl Into<String>, controller: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.pages.write().await.push(PageClient {
            id,
            url: url.into(),
            controller: controller.map(String::from),
        });
        id
    }

    /// Removes a page. Returns whether it was open.
    pub async fn close(&self, id: Uuid) -> bool {
        let mut pages = self.pages.write().await;
        let before = pages.len();
        pages.retain(|p| p.id != id);
        pages.len() != before
    }

    /// Snapshot of the open pages.
    pub async fn pages(&self) -> Vec<PageClient> {
        self.pages.read().await.clone()
    }
}

#[async_trait]
impl Clients for PageClients {
    async fn claim(&self, generation: &str) -> Result<usize> {
        let mut claimed = 0;
        for page in self.pages.write().await.iter_mut() {
            if page.controller.as_deref() != Some(generation) {
                page.controller = Some(generation.to_string());
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}
