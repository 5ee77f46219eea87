//! # Storefront Handle
//!
//! Owns every store and the background tasks that tie them together.
//! Pages receive clones of the stores they need instead of reaching for
//! globals.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  new(config, storage)                                                   │
//! │    • cart and branch snapshots loaded synchronously                     │
//! │    • cart logout policy hooked into the session cell                    │
//! │                                                                         │
//! │  start()                                                                │
//! │    • session restore ─┐                                                 │
//! │    • branch restore  ─┴─ concurrently                                   │
//! │    • spawn: catalog reload on branch change                             │
//! │                                                                         │
//! │  shutdown() / Drop                                                      │
//! │    • background tasks aborted                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use peelo_core::{Branch, User};

use crate::branch::BranchStore;
use crate::cart::CartStore;
use crate::catalog::CatalogFeed;
use crate::config::ClientConfig;
use crate::error::{ConfigResult, StartupResult, StorageError};
use crate::http::HttpClient;
use crate::profile::ProfileService;
use crate::session::{SessionCell, SessionStore};
use crate::storage::{FileStorage, SharedStorage};
use crate::toast::ToastNotifier;

/// What [`Storefront::start`] recovered from the previous run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restored {
    pub user: Option<User>,
    pub branch: Option<Branch>,
}

pub struct Storefront {
    config: ClientConfig,
    http: HttpClient,
    session: SessionStore,
    branches: BranchStore,
    cart: CartStore,
    catalog: CatalogFeed,
    profile: ProfileService,
    toasts: ToastNotifier,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Storefront {
    /// Builds every store on top of `storage`.
    pub fn new(config: ClientConfig, storage: SharedStorage) -> ConfigResult<Self> {
        config.validate()?;

        let cell = Arc::new(SessionCell::new(storage.clone()));
        let http = HttpClient::new(&config.api, &config.catalog, cell.clone())?;
        let session = SessionStore::new(http.clone(), cell.clone());
        let branches = BranchStore::new(http.clone(), storage.clone());
        let cart = CartStore::new(storage);
        cart.apply_logout_policy(&cell, config.session.cart_on_logout);
        let catalog = CatalogFeed::new(http.clone(), branches.clone(), config.catalog.featured_limit);
        let profile = ProfileService::new(http.clone(), cell.clone());
        let toasts = ToastNotifier::new(config.toast.duration());

        Ok(Self {
            config,
            http,
            session,
            branches,
            cart,
            catalog,
            profile,
            toasts,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Opens a storefront persisting to the configured data directory.
    pub fn open(config: ClientConfig) -> StartupResult<Self> {
        let dir = config.storage_dir().ok_or(StorageError::Unavailable)?;
        let storage: SharedStorage = Arc::new(FileStorage::open(dir)?);
        Ok(Self::new(config, storage)?)
    }

    /// Restores session and branch, then starts the catalog follower.
    ///
    /// Calling it again only repeats the restore; the follower is spawned once.
    pub async fn start(&self) -> Restored {
        let (user, branch) = tokio::join!(self.session.restore(), self.branches.restore());

        if let Ok(mut tasks) = self.tasks.lock() {
            if tasks.is_empty() {
                tasks.push(self.catalog.spawn_follower());
                debug!("Catalog follower started");
            }
        }

        info!(
            authenticated = user.is_some(),
            branch_id = ?branch.as_ref().map(|b| b.id),
            "Storefront started"
        );
        Restored { user, branch }
    }

    /// Stops the background followers. Stores stay usable.
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn branches(&self) -> &BranchStore {
        &self.branches
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn catalog(&self) -> &CatalogFeed {
        &self.catalog
    }

    pub fn profile(&self) -> &ProfileService {
        &self.profile
    }

    pub fn toasts(&self) -> &ToastNotifier {
        &self.toasts
    }
}

impl Drop for Storefront {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CartLogoutPolicy;
    use crate::http::test_support::*;
    use crate::storage::MemoryStorage;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use peelo_core::{EntityId, Money, Product};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn api_router() -> Router {
        Router::new()
            .route(
                "/api/auth/login/",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": "Login successful",
                                "access_token": "tok-1",
                                "refresh_token": "ref-1",
                                "user": {"id": 7, "email": "asha@example.com", "full_name": "Asha"}
                            })),
                        )
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"message": "Invalid credentials"})),
                        )
                    }
                }),
            )
            .route("/api/auth/logout/", post(|| async { StatusCode::OK }))
            .route(
                "/api/users/profile/",
                get(|headers: HeaderMap| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer tok-1");
                    if authorized {
                        (
                            StatusCode::OK,
                            Json(json!({"id": 7, "email": "asha@example.com", "full_name": "Asha"})),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"detail": "Token is invalid or expired"})),
                        )
                    }
                }),
            )
            .route(
                "/api/products/branches/",
                get(|| async { Json(json!([{"id": 3, "name": "Indiranagar"}])) }),
            )
            .route(
                "/api/products/branches/{id}/products/",
                get(|Path(id): Path<EntityId>| async move {
                    Json(json!({"results": [{"id": id * 10, "name": "Beetroot", "price": "90.00"}]}))
                }),
            )
            .route(
                "/api/products/juices/",
                get(|| async {
                    Json(json!({"results": [{"id": 1, "name": "Orange", "price": "120.00"}]}))
                }),
            )
    }

    fn orange() -> Product {
        serde_json::from_value(json!({"id": 1, "name": "Orange", "price": "120.00"})).unwrap()
    }

    async fn storefront(policy: CartLogoutPolicy) -> (Storefront, SharedStorage) {
        let addr = serve(api_router()).await;
        let mut config = config_for(addr);
        config.session.cart_on_logout = policy;
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        (Storefront::new(config, storage.clone()).unwrap(), storage)
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut config = ClientConfig::default();
        config.api.base_url = "ftp://example.com".into();
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        assert!(Storefront::new(config, storage).is_err());
    }

    #[tokio::test]
    async fn test_login_and_cart_survive_restart() {
        let (app, storage) = storefront(CartLogoutPolicy::Keep).await;
        app.start().await;

        app.session().login("asha@example.com", "secret").await.unwrap();
        app.cart().add(&orange(), 2).unwrap();
        app.branches().select(serde_json::from_value(json!({"id": 3, "name": "Indiranagar"})).unwrap());
        let config = app.config().clone();
        drop(app);

        let reopened = Storefront::new(config, storage).unwrap();
        assert_eq!(reopened.cart().count(), 2);
        let restored = reopened.start().await;
        assert_eq!(restored.user.unwrap().email, "asha@example.com");
        assert_eq!(restored.branch.unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_logout_policy_clear_empties_cart() {
        let (app, _) = storefront(CartLogoutPolicy::Clear).await;
        app.start().await;
        app.session().login("asha@example.com", "secret").await.unwrap();
        app.cart().add(&orange(), 1).unwrap();

        app.session().logout().await;
        assert_eq!(app.cart().count(), 0);
        assert_eq!(app.cart().total(), Money::zero());
    }

    #[tokio::test]
    async fn test_logout_policy_clear_holds_without_start() {
        let (app, _) = storefront(CartLogoutPolicy::Clear).await;
        app.session().login("asha@example.com", "secret").await.unwrap();
        app.cart().add(&orange(), 1).unwrap();

        app.session().logout().await;
        app.session().login("asha@example.com", "secret").await.unwrap();
        assert_eq!(app.cart().count(), 0);

        app.cart().add(&orange(), 3).unwrap();
        assert_eq!(app.cart().count(), 3);
    }

    #[tokio::test]
    async fn test_logout_policy_keep_leaves_cart() {
        let (app, _) = storefront(CartLogoutPolicy::Keep).await;
        app.start().await;
        app.session().login("asha@example.com", "secret").await.unwrap();
        app.cart().add(&orange(), 1).unwrap();

        app.session().logout().await;
        assert_eq!(app.cart().count(), 1);
        assert!(app.session().current_user().is_none());
    }

    #[tokio::test]
    async fn test_catalog_follows_branch_selection() {
        let (app, _) = storefront(CartLogoutPolicy::Keep).await;
        app.start().await;
        app.catalog().refresh().await.unwrap();
        assert_eq!(app.catalog().home_products()[0].name, "Orange");

        let mut rx = app.catalog().subscribe();
        rx.mark_unchanged();
        app.branches().select(serde_json::from_value(json!({"id": 3, "name": "Indiranagar"})).unwrap());
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.catalog().products()[0].id, 30);
    }

    #[tokio::test]
    async fn test_failed_login_reported_as_toast() {
        let (app, storage) = storefront(CartLogoutPolicy::Keep).await;
        let result = app.session().login("asha@example.com", "wrong").await;
        app.toasts().report(&result, "Welcome back!");

        assert_eq!(app.toasts().active()[0].message, "Invalid credentials");
        assert!(!app.session().is_authenticated());
        assert_eq!(storage.get(crate::storage::SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_shutdown_stops_followers() {
        let (app, _) = storefront(CartLogoutPolicy::Keep).await;
        app.start().await;
        app.shutdown();
        assert!(app.tasks.lock().unwrap().is_empty());
    }
}
