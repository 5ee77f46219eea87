//! # Branch Store
//!
//! The selected branch: a single optional, persisted value that scopes
//! catalog queries. Login and logout never touch it.
//!
//! ## Selection Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  select(b) / clear()                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BranchState { branch, generation + 1 } ──► persisted to branch.json   │
//! │       │                                                                 │
//! │       ▼ watch notify                                                    │
//! │  CatalogFeed follower ──► refresh() for the new scope                   │
//! │                            (responses tagged with an older generation   │
//! │                             are dropped)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use peelo_core::envelope::{decode_list, RESULTS_FIELD};
use peelo_core::{Branch, EntityId};

use crate::error::ApiResult;
use crate::http::HttpClient;
use crate::storage::{persist_json, restore_json, SharedStorage, BRANCH_KEY};

pub const BRANCHES_PATH: &str = "/products/branches/";

/// What subscribers observe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchState {
    pub branch: Option<Branch>,
    /// Bumped on every selection change; never on detail refreshes.
    pub generation: u64,
}

#[derive(Clone)]
pub struct BranchStore {
    http: HttpClient,
    tx: Arc<watch::Sender<BranchState>>,
    storage: SharedStorage,
}

impl BranchStore {
    /// Creates the store with whatever branch was persisted last run.
    pub fn new(http: HttpClient, storage: SharedStorage) -> Self {
        let branch: Option<Branch> = restore_json(storage.as_ref(), BRANCH_KEY);
        if let Some(branch) = &branch {
            debug!(branch_id = branch.id, "Loaded persisted branch");
        }
        let (tx, _) = watch::channel(BranchState {
            branch,
            generation: 0,
        });
        Self {
            http,
            tx: Arc::new(tx),
            storage,
        }
    }

    pub fn current(&self) -> Option<Branch> {
        self.tx.borrow().branch.clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn state(&self) -> BranchState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BranchState> {
        self.tx.subscribe()
    }

    /// Selects a branch. Re-selecting the identical branch is a no-op.
    pub fn select(&self, branch: Branch) {
        let changed = self.tx.send_if_modified(|state| {
            if state.branch.as_ref() == Some(&branch) {
                return false;
            }
            state.branch = Some(branch.clone());
            state.generation += 1;
            true
        });
        if changed {
            info!(branch_id = branch.id, name = %branch.name, "Branch selected");
            persist_json(self.storage.as_ref(), BRANCH_KEY, Some(&branch));
        }
    }

    pub fn clear(&self) {
        let changed = self.tx.send_if_modified(|state| {
            if state.branch.is_none() {
                return false;
            }
            state.branch = None;
            state.generation += 1;
            true
        });
        if changed {
            info!("Branch selection cleared");
            persist_json::<Branch>(self.storage.as_ref(), BRANCH_KEY, None);
        }
    }

    /// All branches the API lists.
    pub async fn list(&self) -> ApiResult<Vec<Branch>> {
        let body = self.http.get(BRANCHES_PATH).await?;
        Ok(decode_list(body, &[RESULTS_FIELD]))
    }

    /// Checks the persisted branch still exists and is open for orders.
    ///
    /// A branch that disappeared or was deactivated is cleared; if the
    /// listing cannot be fetched the persisted snapshot is kept.
    pub async fn restore(&self) -> Option<Branch> {
        let BranchState { branch, generation } = self.state();
        let persisted = branch?;

        let branches = match self.list().await {
            Ok(branches) => branches,
            Err(e) => {
                warn!(error = %e, "Could not verify persisted branch, keeping it");
                return Some(persisted);
            }
        };

        if self.generation() != generation {
            debug!("Branch changed while verifying, keeping the new selection");
            return self.current();
        }

        match find_active(&branches, persisted.id) {
            Some(fresh) => {
                self.refresh_details(fresh.clone());
                Some(fresh.clone())
            }
            None => {
                info!(branch_id = persisted.id, "Persisted branch no longer available");
                self.clear();
                None
            }
        }
    }

    /// Replaces the stored details of the already selected branch without
    /// counting as a new selection.
    fn refresh_details(&self, fresh: Branch) {
        let changed = self.tx.send_if_modified(|state| match &state.branch {
            Some(current) if current.id == fresh.id && *current != fresh => {
                state.branch = Some(fresh.clone());
                true
            }
            _ => false,
        });
        if changed {
            persist_json(self.storage.as_ref(), BRANCH_KEY, Some(&fresh));
        }
    }
}

fn find_active(branches: &[Branch], id: EntityId) -> Option<&Branch> {
    branches.iter().find(|b| b.id == id && b.is_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::*;
    use crate::storage::{load_json, save_json};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn branch(id: EntityId, name: &str) -> Branch {
        serde_json::from_value(json!({"id": id, "name": name, "city": "Bengaluru"})).unwrap()
    }

    async fn store_listing(listing: serde_json::Value) -> (BranchStore, SharedStorage) {
        let router = Router::new().route(
            "/api/products/branches/",
            get(move || {
                let listing = listing.clone();
                async move { Json(listing) }
            }),
        );
        let addr = serve(router).await;
        let (http, _, storage) = client_with(&config_for(addr));
        (BranchStore::new(http, storage.clone()), storage)
    }

    fn offline_store() -> (BranchStore, SharedStorage) {
        let (http, _, storage) = client_with(&unreachable_config());
        (BranchStore::new(http, storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_select_and_clear_bump_generation() {
        let (store, storage) = offline_store();
        let mut rx = store.subscribe();
        assert_eq!(store.current(), None);

        store.select(branch(1, "Indiranagar"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().generation, 1);
        assert_eq!(store.current().unwrap().id, 1);

        let persisted: Branch = load_json(storage.as_ref(), BRANCH_KEY).unwrap().unwrap();
        assert_eq!(persisted.id, 1);

        store.clear();
        assert_eq!(store.generation(), 2);
        assert_eq!(storage.get(BRANCH_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_reselect_same_branch_is_noop() {
        let (store, _) = offline_store();
        store.select(branch(1, "Indiranagar"));
        let rx = store.subscribe();

        store.select(branch(1, "Indiranagar"));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.generation(), 1);

        store.clear();
        store.clear();
        assert_eq!(store.generation(), 2);
    }

    #[tokio::test]
    async fn test_persisted_branch_loaded_at_construction() {
        let (http, _, storage) = client_with(&unreachable_config());
        save_json(storage.as_ref(), BRANCH_KEY, &branch(4, "Koramangala")).unwrap();

        let store = BranchStore::new(http, storage);
        assert_eq!(store.current().unwrap().name, "Koramangala");
    }

    #[tokio::test]
    async fn test_list_accepts_bare_and_paginated() {
        let (store, _) = store_listing(json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}])).await;
        assert_eq!(store.list().await.unwrap().len(), 2);

        let (store, _) = store_listing(json!({"count": 1, "results": [{"id": 3, "name": "C"}]})).await;
        assert_eq!(store.list().await.unwrap()[0].id, 3);
    }

    #[tokio::test]
    async fn test_restore_refreshes_existing_branch() {
        let (store, storage) =
            store_listing(json!([{"id": 4, "name": "Koramangala 2.0", "is_active": true}])).await;
        store.select(branch(4, "Koramangala"));

        let restored = store.restore().await.unwrap();
        assert_eq!(restored.name, "Koramangala 2.0");
        assert_eq!(store.current().unwrap().name, "Koramangala 2.0");
        // Same branch, so catalog scope did not change
        assert_eq!(store.generation(), 1);

        let persisted: Branch = load_json(storage.as_ref(), BRANCH_KEY).unwrap().unwrap();
        assert_eq!(persisted.name, "Koramangala 2.0");
    }

    #[tokio::test]
    async fn test_restore_clears_missing_or_inactive_branch() {
        let (store, storage) = store_listing(json!([
            {"id": 1, "name": "A"},
            {"id": 4, "name": "Closed", "is_active": false}
        ]))
        .await;
        store.select(branch(4, "Koramangala"));

        assert_eq!(store.restore().await, None);
        assert_eq!(store.current(), None);
        assert_eq!(storage.get(BRANCH_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_offline_keeps_branch() {
        let (store, _) = offline_store();
        store.select(branch(4, "Koramangala"));

        assert_eq!(store.restore().await.unwrap().id, 4);
        assert_eq!(store.current().unwrap().id, 4);
    }

    #[tokio::test]
    async fn test_restore_without_branch_skips_request() {
        let (store, _) = offline_store();
        assert_eq!(store.restore().await, None);
    }
}
