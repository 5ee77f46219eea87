//! # Session Store
//!
//! Owns the credential lifecycle: login, logout, restore at startup and
//! forced logout when the server rejects the credential.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                 login() ok / restore() ok                               │
//! │   ┌───────────┐ ─────────────────────────► ┌─────────────────────────┐  │
//! │   │ Anonymous │                            │ Authenticated           │  │
//! │   │           │ ◄───────────────────────── │  { user, credential }   │  │
//! │   └───────────┘  logout() / any 401        └─────────────────────────┘  │
//! │                                                                         │
//! │  Every transition replaces the whole `Session` value in one             │
//! │  watch::Sender call and advances the epoch, then subscribers are        │
//! │  notified. Nobody can observe a credential without its user.            │
//! │                                                                         │
//! │  Authenticated ──► Anonymous also runs the session-end hooks before     │
//! │  the ending call returns (cart logout policy).                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Restore Policy
//! | Persisted credential       | Outcome                                   |
//! |----------------------------|-------------------------------------------|
//! | none / unreadable          | anonymous                                 |
//! | JWT `exp` already passed   | anonymous, credential discarded           |
//! | profile fetch ok           | authenticated                             |
//! | profile fetch rejected     | anonymous, credential discarded           |
//! | network failure            | anonymous, credential kept for next start |
//! | login/logout during fetch  | the newer transition wins                 |

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use peelo_core::validation::{validate_identifier, validate_password};
use peelo_core::{Credential, Session, User};

use crate::error::{ApiError, ApiResult};
use crate::http::{decode, HttpClient, Method, RequestOptions};
use crate::profile::PROFILE_PATH;
use crate::storage::{persist_json, restore_json, SharedStorage, SESSION_KEY};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";

// =============================================================================
// Session Cell
// =============================================================================

/// Runs synchronously whenever an authenticated session ends.
pub type SessionEndHook = Box<dyn Fn() + Send + Sync>;

/// The single process-wide session value.
///
/// Shared between the store and [`HttpClient`], which reads the credential
/// for every request and clears the session on a 401.
pub struct SessionCell {
    tx: watch::Sender<Session>,
    /// Advanced inside every transition; only written under the watch lock.
    epoch: AtomicU64,
    end_hooks: RwLock<Vec<SessionEndHook>>,
    storage: SharedStorage,
}

impl SessionCell {
    pub fn new(storage: SharedStorage) -> Self {
        let (tx, _) = watch::channel(Session::Anonymous);
        Self {
            tx,
            epoch: AtomicU64::new(0),
            end_hooks: RwLock::new(Vec::new()),
            storage,
        }
    }

    /// Number of session transitions so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Registers `hook` to run every time an authenticated session ends,
    /// whether by logout or by a rejected credential.
    pub fn on_session_end(&self, hook: impl Fn() + Send + Sync + 'static) {
        match self.end_hooks.write() {
            Ok(mut hooks) => hooks.push(Box::new(hook)),
            Err(_) => warn!("Session hook registry poisoned, hook dropped"),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.tx.borrow().credential().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Replaces the session with an authenticated one and persists the
    /// credential.
    pub(crate) fn establish(&self, user: User, credential: Credential) {
        persist_json(self.storage.as_ref(), SESSION_KEY, Some(&credential));
        self.tx.send_modify(|session| {
            *session = Session::Authenticated { user, credential };
            self.epoch.fetch_add(1, Ordering::SeqCst);
        });
    }

    /// Like [`SessionCell::establish`], but only if no transition happened
    /// since `epoch` was read. Returns whether the session was established.
    pub(crate) fn establish_if_unchanged(
        &self,
        epoch: u64,
        user: User,
        credential: Credential,
    ) -> bool {
        let persisted = credential.clone();
        let established = self.tx.send_if_modified(|session| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            *session = Session::Authenticated { user, credential };
            self.epoch.fetch_add(1, Ordering::SeqCst);
            true
        });
        if established {
            persist_json(self.storage.as_ref(), SESSION_KEY, Some(&persisted));
        }
        established
    }

    /// Swaps the user of an authenticated session. No-op when anonymous.
    pub(crate) fn update_user(&self, user: User) -> bool {
        self.tx.send_if_modified(|session| match session {
            Session::Authenticated { user: current, .. } => {
                *current = user;
                true
            }
            Session::Anonymous => false,
        })
    }

    /// Ends the session. Returns the credential that was active, if any.
    pub(crate) fn clear(&self) -> Option<Credential> {
        let mut previous = None;
        self.tx.send_if_modified(|session| match std::mem::take(session) {
            Session::Authenticated { credential, .. } => {
                previous = Some(credential);
                self.epoch.fetch_add(1, Ordering::SeqCst);
                true
            }
            Session::Anonymous => false,
        });
        if previous.is_some() {
            self.ended();
        }
        previous
    }

    /// Clears the session only if `credential` is still the active one.
    ///
    /// A 401 for a credential that has since been replaced must not log
    /// out the newer session.
    pub(crate) fn invalidate_if_current(&self, credential: &Credential) -> bool {
        let mut invalidated = false;
        self.tx.send_if_modified(|session| {
            if session.credential() == Some(credential) {
                *session = Session::Anonymous;
                self.epoch.fetch_add(1, Ordering::SeqCst);
                invalidated = true;
            }
            invalidated
        });
        if invalidated {
            self.ended();
        }
        invalidated
    }

    /// Drops the persisted credential and runs the end hooks. Called after
    /// the watch lock is released, so hooks may read the session.
    fn ended(&self) {
        persist_json::<Credential>(self.storage.as_ref(), SESSION_KEY, None);
        match self.end_hooks.read() {
            Ok(hooks) => hooks.iter().for_each(|hook| hook()),
            Err(_) => warn!("Session hook registry poisoned, hooks skipped"),
        }
    }

    fn storage(&self) -> &SharedStorage {
        &self.storage
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// True when `token` is a JWT whose `exp` lies in the past.
///
/// The signature is not checked; the server stays the authority. Opaque
/// tokens and tokens without `exp` are never considered expired here.
pub fn token_expired(token: &str) -> bool {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data
            .claims
            .exp
            .is_some_and(|exp| exp <= chrono::Utc::now().timestamp()),
        Err(e) => {
            debug!(error = %e, "Credential is not a readable JWT, skipping expiry check");
            false
        }
    }
}

// =============================================================================
// Session Store
// =============================================================================

/// Login, logout and restore.
#[derive(Clone)]
pub struct SessionStore {
    http: HttpClient,
    cell: Arc<SessionCell>,
}

impl SessionStore {
    pub fn new(http: HttpClient, cell: Arc<SessionCell>) -> Self {
        Self { http, cell }
    }

    /// Authenticates with an email or phone number and a password.
    ///
    /// ## Flow
    /// ```text
    /// validate ──► POST /auth/login/ ──► GET /users/profile/ ──► establish
    ///   │              │ (anonymous)        (new credential)        │
    ///   ▼              ▼                                            ▼
    /// ValidationFailure   ServerRejected / Unauthorized     subscribers notified
    /// (no request)        (session untouched)
    /// ```
    pub async fn login(&self, identifier: &str, password: &str) -> ApiResult<User> {
        validate_identifier(identifier)?;
        validate_password(password)?;

        let body = json!({ "email_or_phone": identifier, "password": password });
        let response: LoginResponse = decode(
            self.http
                .request(Method::POST, LOGIN_PATH, Some(&body), RequestOptions::anonymous())
                .await?,
        )?;

        let credential = Credential::new(response.access_token, response.refresh_token);
        let user = match (self.fetch_user(&credential).await, response.user) {
            (Ok(user), _) => user,
            (Err(e), Some(embedded)) if !matches!(e, ApiError::Unauthorized { .. }) => {
                warn!(error = %e, "Profile fetch after login failed, using login payload");
                embedded
            }
            (Err(e), _) => return Err(e),
        };

        self.cell.establish(user.clone(), credential);
        info!(email = %user.email, "Logged in");
        Ok(user)
    }

    /// Ends the session. Idempotent.
    ///
    /// Local state is cleared first; the server-side refresh token
    /// blacklist is best-effort.
    pub async fn logout(&self) {
        let Some(credential) = self.cell.clear() else {
            debug!("Logout requested while anonymous");
            return;
        };
        info!("Logged out");

        if let Some(refresh_token) = credential.refresh_token.clone() {
            let body = json!({ "refresh_token": refresh_token });
            if let Err(e) = self
                .http
                .request(
                    Method::POST,
                    LOGOUT_PATH,
                    Some(&body),
                    RequestOptions::with_credential(credential),
                )
                .await
            {
                warn!(error = %e, "Server-side logout failed, local session already cleared");
            }
        }
    }

    /// Re-validates a persisted credential once at startup.
    ///
    /// Never fails; every failure leaves the session anonymous.
    pub async fn restore(&self) -> Option<User> {
        let epoch = self.cell.epoch();
        let storage = self.cell.storage().clone();
        let Some(credential) = restore_json::<Credential>(storage.as_ref(), SESSION_KEY) else {
            debug!("No persisted session");
            return None;
        };

        if token_expired(&credential.access_token) {
            info!("Persisted session expired, discarding");
            persist_json::<Credential>(storage.as_ref(), SESSION_KEY, None);
            return None;
        }

        match self.fetch_user(&credential).await {
            Ok(user) => {
                if !self.cell.establish_if_unchanged(epoch, user.clone(), credential) {
                    // A login or logout happened meanwhile; it wins
                    debug!("Session changed during restore, ignoring persisted one");
                    return self.current_user();
                }
                info!(email = %user.email, "Session restored");
                Some(user)
            }
            Err(ApiError::NetworkFailure { detail }) => {
                warn!(%detail, "Could not verify persisted session, starting anonymous");
                None
            }
            Err(e) => {
                info!(error = %e, "Persisted session rejected, discarding");
                if self.cell.epoch() == epoch {
                    persist_json::<Credential>(storage.as_ref(), SESSION_KEY, None);
                }
                None
            }
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.cell.snapshot().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.snapshot().is_authenticated()
    }

    pub fn session(&self) -> Session {
        self.cell.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.cell.subscribe()
    }

    async fn fetch_user(&self, credential: &Credential) -> ApiResult<User> {
        decode(
            self.http
                .request(
                    Method::GET,
                    PROFILE_PATH,
                    None,
                    RequestOptions::with_credential(credential.clone()),
                )
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::http::test_support::*;
    use crate::storage::{load_json, save_json};
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    struct FakeAuth {
        revoked: Arc<Mutex<Vec<String>>>,
    }

    fn profile_json() -> Value {
        json!({
            "id": 7,
            "email": "asha@example.com",
            "full_name": "Asha Rao",
            "phone_number": "9876543210",
            "is_email_verified": true,
            "is_phone_verified": false,
            "created_at": "2025-01-05T10:00:00Z"
        })
    }

    fn auth_router(state: FakeAuth) -> Router {
        Router::new()
            .route(
                "/api/auth/login/",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" && body["email_or_phone"] == "asha@example.com" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "message": "Login successful",
                                "access_token": "tok-1",
                                "refresh_token": "ref-1",
                                "is_superuser": false,
                                "user": {"email": "asha@example.com", "full_name": "Asha Rao"}
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"message": "Invalid credentials"})),
                        )
                    }
                }),
            )
            .route(
                "/api/users/profile/",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("Bearer tok-1") => (StatusCode::OK, Json(profile_json())),
                        _ => (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"detail": "Given token not valid for any token type"})),
                        ),
                    }
                }),
            )
            .route(
                "/api/auth/logout/",
                post(
                    |State(state): State<FakeAuth>, Json(body): Json<Value>| async move {
                        if let Some(token) = body["refresh_token"].as_str() {
                            state.revoked.lock().unwrap().push(token.to_string());
                        }
                        (StatusCode::OK, Json(json!({"message": "Logout successful"})))
                    },
                ),
            )
            .with_state(state)
    }

    async fn store_with_fake(state: FakeAuth) -> (SessionStore, Arc<SessionCell>, SharedStorage) {
        let addr = serve(auth_router(state)).await;
        let (http, cell, storage) = client_with(&config_for(addr));
        (SessionStore::new(http, cell.clone()), cell, storage)
    }

    fn jwt_expiring_at(exp: i64) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &json!({"exp": exp, "user_id": 7}),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let (store, _, storage) = store_with_fake(FakeAuth::default()).await;
        let mut rx = store.subscribe();

        let user = store.login("asha@example.com", "secret").await.unwrap();

        assert_eq!(user.id, Some(7));
        assert_eq!(store.current_user(), Some(user));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        let persisted: Credential = load_json(storage.as_ref(), SESSION_KEY).unwrap().unwrap();
        assert_eq!(persisted.access_token, "tok-1");
    }

    #[tokio::test]
    async fn test_login_rejected_stays_anonymous() {
        let (store, _, storage) = store_with_fake(FakeAuth::default()).await;

        let err = store.login("asha@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_validation_blocks_request() {
        // Unreachable server: a request would surface as NetworkFailure
        let (http, cell, _) = client_with(&unreachable_config());
        let store = SessionStore::new(http, cell);

        let err = store.login("", "secret").await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::ValidationFailure);
        let err = store.login("asha@example.com", "").await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::ValidationFailure);
    }

    #[tokio::test]
    async fn test_logout_clears_and_revokes() {
        let state = FakeAuth::default();
        let (store, _, storage) = store_with_fake(state.clone()).await;
        store.login("asha@example.com", "secret").await.unwrap();

        store.logout().await;

        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
        assert_eq!(*state.revoked.lock().unwrap(), vec!["ref-1".to_string()]);

        // Idempotent
        store.logout().await;
        assert_eq!(state.revoked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_succeeds_offline() {
        let (http, cell, _) = client_with(&unreachable_config());
        cell.establish(
            serde_json::from_value(profile_json()).unwrap(),
            Credential::new("tok-1", Some("ref-1".into())),
        );
        let store = SessionStore::new(http, cell);

        store.logout().await;
        assert!(store.current_user().is_none());
    }

    #[tokio::test]
    async fn test_restore_valid_credential() {
        let (store, _, storage) = store_with_fake(FakeAuth::default()).await;
        save_json(storage.as_ref(), SESSION_KEY, &Credential::new("tok-1", None)).unwrap();

        let user = store.restore().await.unwrap();
        assert_eq!(user.full_name, "Asha Rao");
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_rejected_credential_is_silent() {
        let (store, _, storage) = store_with_fake(FakeAuth::default()).await;
        save_json(storage.as_ref(), SESSION_KEY, &Credential::new("revoked", None)).unwrap();

        assert!(store.restore().await.is_none());
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_offline_keeps_credential() {
        let (http, cell, storage) = client_with(&unreachable_config());
        save_json(storage.as_ref(), SESSION_KEY, &Credential::new("tok-1", None)).unwrap();
        let store = SessionStore::new(http, cell);

        assert!(store.restore().await.is_none());
        assert!(!store.is_authenticated());
        assert!(storage.get(SESSION_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore_discards_expired_jwt() {
        // No server needed: the expiry check happens before any request
        let (http, cell, storage) = client_with(&unreachable_config());
        let expired = jwt_expiring_at(chrono::Utc::now().timestamp() - 60);
        save_json(storage.as_ref(), SESSION_KEY, &Credential::new(expired, None)).unwrap();
        let store = SessionStore::new(http, cell);

        assert!(store.restore().await.is_none());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_token_expiry_check() {
        let now = chrono::Utc::now().timestamp();
        assert!(token_expired(&jwt_expiring_at(now - 1)));
        assert!(!token_expired(&jwt_expiring_at(now + 3600)));
        assert!(!token_expired("opaque-token"));
    }

    #[test]
    fn test_invalidate_only_current_credential() {
        let storage: SharedStorage = Arc::new(crate::storage::MemoryStorage::new());
        let cell = SessionCell::new(storage);
        let user: User = serde_json::from_value(profile_json()).unwrap();
        let old = Credential::new("old", None);
        let fresh = Credential::new("fresh", None);

        cell.establish(user, fresh.clone());
        assert!(!cell.invalidate_if_current(&old));
        assert!(cell.snapshot().is_authenticated());

        assert!(cell.invalidate_if_current(&fresh));
        assert_eq!(cell.snapshot(), Session::Anonymous);
    }

    #[test]
    fn test_update_user_requires_session() {
        let storage: SharedStorage = Arc::new(crate::storage::MemoryStorage::new());
        let cell = SessionCell::new(storage);
        let user: User = serde_json::from_value(profile_json()).unwrap();

        assert!(!cell.update_user(user.clone()));
        cell.establish(user.clone(), Credential::new("tok", None));

        let renamed = User {
            full_name: "Asha R".into(),
            ..user
        };
        assert!(cell.update_user(renamed));
        assert_eq!(cell.snapshot().user().unwrap().full_name, "Asha R");
    }

    #[derive(Clone)]
    struct SlowProfile {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    fn slow_profile_router(gate: SlowProfile) -> Router {
        Router::new()
            .route(
                "/api/auth/login/",
                post(|| async {
                    Json(json!({
                        "access_token": "tok-1",
                        "user": {"email": "asha@example.com", "full_name": "Asha Rao"}
                    }))
                }),
            )
            .route(
                "/api/users/profile/",
                get(|State(gate): State<SlowProfile>, headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer old-tok") {
                        gate.entered.notify_one();
                        gate.release.notified().await;
                    }
                    Json(profile_json())
                }),
            )
            .with_state(gate)
    }

    #[tokio::test]
    async fn test_restore_never_revives_session_after_logout() {
        let gate = SlowProfile {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        let addr = serve(slow_profile_router(gate.clone())).await;
        let (http, cell, storage) = client_with(&config_for(addr));
        save_json(storage.as_ref(), SESSION_KEY, &Credential::new("old-tok", None)).unwrap();
        let store = SessionStore::new(http, cell);

        let restoring = {
            let store = store.clone();
            tokio::spawn(async move { store.restore().await })
        };
        gate.entered.notified().await;

        store.login("asha@example.com", "secret").await.unwrap();
        store.logout().await;
        gate.release.notify_one();

        assert_eq!(restoring.await.unwrap(), None);
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_establish_if_unchanged_checks_epoch() {
        let storage: SharedStorage = Arc::new(crate::storage::MemoryStorage::new());
        let cell = SessionCell::new(storage.clone());
        let user: User = serde_json::from_value(profile_json()).unwrap();

        let epoch = cell.epoch();
        cell.establish(user.clone(), Credential::new("tok-1", None));
        cell.clear();
        assert_eq!(cell.epoch(), epoch + 2);

        assert!(!cell.establish_if_unchanged(epoch, user.clone(), Credential::new("old", None)));
        assert_eq!(cell.snapshot(), Session::Anonymous);
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);

        assert!(cell.establish_if_unchanged(cell.epoch(), user, Credential::new("old", None)));
        assert_eq!(cell.credential().unwrap().access_token, "old");
    }

    #[test]
    fn test_end_hooks_run_on_every_ending() {
        let storage: SharedStorage = Arc::new(crate::storage::MemoryStorage::new());
        let cell = SessionCell::new(storage);
        let user: User = serde_json::from_value(profile_json()).unwrap();
        let endings = Arc::new(AtomicUsize::new(0));
        {
            let endings = endings.clone();
            cell.on_session_end(move || {
                endings.fetch_add(1, Ordering::SeqCst);
            });
        }

        cell.clear();
        assert_eq!(endings.load(Ordering::SeqCst), 0);

        cell.establish(user.clone(), Credential::new("tok-1", None));
        cell.clear();
        assert_eq!(endings.load(Ordering::SeqCst), 1);

        let credential = Credential::new("tok-2", None);
        cell.establish(user, credential.clone());
        assert!(cell.invalidate_if_current(&credential));
        assert_eq!(endings.load(Ordering::SeqCst), 2);
    }
}
