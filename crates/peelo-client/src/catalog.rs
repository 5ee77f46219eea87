//! # Catalog Feed
//!
//! Product listing for the home and shop pages, scoped to the selected
//! branch.
//!
//! ## Stale Response Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  refresh() #1  ── ticket 1, branch gen 3 ──► GET …/juices/ ····(slow)   │
//! │  select(b)     ── branch gen 4                                          │
//! │  refresh() #2  ── ticket 2, branch gen 4 ──► GET …/branches/7/products/ │
//! │                                              ◄── Applied(n)             │
//! │                                                                         │
//! │  #1 finally answers: ticket 1 ≠ 2 ──► Stale (dropped)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use peelo_core::envelope::{decode_list, RESULTS_FIELD};
use peelo_core::{Branch, EntityId, Product};

use crate::branch::BranchStore;
use crate::error::ApiResult;
use crate::http::HttpClient;

pub const JUICES_PATH: &str = "/products/juices/";

/// Products listed for a branch.
pub fn branch_products_path(branch_id: EntityId) -> String {
    format!("/products/branches/{branch_id}/products/")
}

/// What a [`CatalogFeed::refresh`] did with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The listing replaced the feed; carries the product count.
    Applied(usize),
    /// A newer refresh or branch change superseded this one.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogState {
    pub products: Vec<Product>,
    /// Branch the listing was fetched for; `None` is the global juice list.
    pub branch_id: Option<EntityId>,
    /// False until the first listing is applied.
    pub loaded: bool,
}

#[derive(Clone)]
pub struct CatalogFeed {
    http: HttpClient,
    branches: BranchStore,
    tx: Arc<watch::Sender<CatalogState>>,
    ticket: Arc<AtomicU64>,
    featured_limit: usize,
}

impl CatalogFeed {
    pub fn new(http: HttpClient, branches: BranchStore, featured_limit: usize) -> Self {
        let (tx, _) = watch::channel(CatalogState::default());
        Self {
            http,
            branches,
            tx: Arc::new(tx),
            ticket: Arc::new(AtomicU64::new(0)),
            featured_limit,
        }
    }

    /// Fetches the listing for the current branch.
    ///
    /// The response is applied only if no newer refresh started and the
    /// branch selection did not change while it was in flight. A superseded
    /// refresh reports [`LoadOutcome::Stale`] even when its request failed.
    pub async fn refresh(&self) -> ApiResult<LoadOutcome> {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.branches.state();
        let branch_id = state.branch.as_ref().map(|b| b.id);
        let path = branch_id.map_or_else(|| JUICES_PATH.to_string(), branch_products_path);

        let response = self.http.get(&path).await;

        if self.ticket.load(Ordering::SeqCst) != ticket
            || self.branches.generation() != state.generation
        {
            debug!(
                ticket,
                path = %path,
                failed = response.is_err(),
                "Dropping stale catalog response"
            );
            return Ok(LoadOutcome::Stale);
        }

        let products: Vec<Product> = decode_list(response?, &[RESULTS_FIELD]);
        let count = products.len();
        self.tx.send_replace(CatalogState {
            products,
            branch_id,
            loaded: true,
        });
        debug!(path = %path, count, "Catalog updated");
        Ok(LoadOutcome::Applied(count))
    }

    pub fn products(&self) -> Vec<Product> {
        self.tx.borrow().products.clone()
    }

    /// The first `limit` products in listing order.
    pub fn featured(&self, limit: usize) -> Vec<Product> {
        self.tx.borrow().products.iter().take(limit).cloned().collect()
    }

    /// Products for the home page, using the configured limit.
    pub fn home_products(&self) -> Vec<Product> {
        self.featured(self.featured_limit)
    }

    pub fn state(&self) -> CatalogState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.tx.subscribe()
    }

    /// Displayable image URL for a product.
    pub fn image_url(&self, product: &Product) -> String {
        self.http.resolve_media_url(product.image.as_deref())
    }

    /// Re-fetches the listing on every branch change until aborted.
    pub fn spawn_follower(&self) -> JoinHandle<()> {
        let feed = self.clone();
        let mut rx = self.branches.subscribe();
        rx.mark_unchanged();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let branch: Option<Branch> = rx.borrow_and_update().branch.clone();
                debug!(branch_id = ?branch.as_ref().map(|b| b.id), "Branch changed, reloading catalog");
                if let Err(e) = feed.refresh().await {
                    warn!(error = %e, "Catalog reload failed");
                }
            }
        })
    }
}
