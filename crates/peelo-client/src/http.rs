//! # HTTP Client
//!
//! Thin wrapper over `reqwest` that every store talks to the REST API
//! through.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  request(method, path, body, options)                                  │
//! │       │                                                                 │
//! │       ├── base_url + path                                              │
//! │       ├── Authorization: Bearer <access_token>   (if a credential)     │
//! │       ▼                                                                 │
//! │  ┌─────────┐   no response     ┌──────────────────────────────┐        │
//! │  │  send   │──────────────────►│ ApiError::NetworkFailure     │        │
//! │  └────┬────┘                   └──────────────────────────────┘        │
//! │       │ 2xx ──────────────────► Ok(json body, null if empty)           │
//! │       │ 401 ──► invalidate session (if still current) ──►              │
//! │       │                        ApiError::Unauthorized                  │
//! │       │ other ────────────────► ApiError::ServerRejected               │
//! │                                  (message | detail | error | generic)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use peelo_core::Credential;

use crate::config::{ApiSettings, CatalogSettings};
use crate::error::{ApiError, ApiResult, ConfigError, ConfigResult};
use crate::session::SessionCell;

pub use reqwest::Method;

/// Which credential a request carries.
#[derive(Debug, Clone, Default)]
pub enum CredentialMode {
    /// Whatever the current session holds.
    #[default]
    Session,
    /// No Authorization header (login).
    Anonymous,
    /// A specific credential not yet (or no longer) in the session.
    Explicit(Credential),
}

/// Per-request knobs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub credential: CredentialMode,
}

impl RequestOptions {
    pub fn anonymous() -> Self {
        Self {
            credential: CredentialMode::Anonymous,
            ..Self::default()
        }
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: CredentialMode::Explicit(credential),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Shared REST client. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpInner>,
}

struct HttpInner {
    client: reqwest::Client,
    base_url: String,
    media_base_url: String,
    placeholder_image: String,
    session: Arc<SessionCell>,
}

impl HttpClient {
    pub fn new(
        api: &ApiSettings,
        catalog: &CatalogSettings,
        session: Arc<SessionCell>,
    ) -> ConfigResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("peelo-client/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = api.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(HttpInner {
                client,
                base_url: api.base_url.trim_end_matches('/').to_string(),
                media_base_url: api.media_base_url.trim_end_matches('/').to_string(),
                placeholder_image: catalog.placeholder_image.clone(),
                session,
            }),
        })
    }

    /// Absolute URL for an API path. Trailing slashes in `path` are kept.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Resolves a product image reference to something displayable.
    ///
    /// ## Rules
    /// - `http…` URLs are returned untouched
    /// - Other paths are joined to the media host
    /// - Missing or blank images fall back to the placeholder asset
    pub fn resolve_media_url(&self, image: Option<&str>) -> String {
        match image.map(str::trim) {
            Some(image) if image.starts_with("http://") || image.starts_with("https://") => {
                image.to_string()
            }
            Some(image) if !image.is_empty() => {
                format!(
                    "{}/{}",
                    self.inner.media_base_url,
                    image.trim_start_matches('/')
                )
            }
            _ => self.inner.placeholder_image.clone(),
        }
    }

    /// Sends a request and returns the JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        let credential = match options.credential {
            CredentialMode::Session => self.inner.session.credential(),
            CredentialMode::Anonymous => None,
            CredentialMode::Explicit(credential) => Some(credential),
        };

        let mut builder = self.inner.client.request(method.clone(), self.url_for(path));
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(credential) = &credential {
            builder = builder.bearer_auth(&credential.access_token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, path, authenticated = credential.is_some(), "Sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "Request failed without a response");
            ApiError::NetworkFailure {
                detail: e.to_string(),
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| ApiError::NetworkFailure {
            detail: e.to_string(),
        })?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(e) if status.is_success() => return Err(e.into()),
                // Proxies answer errors with HTML; only the status matters then
                Err(_) => Value::Null,
            }
        };

        if status.is_success() {
            debug!(%method, path, status = status.as_u16(), "Request succeeded");
            return Ok(body);
        }

        let err = ApiError::from_response(status.as_u16(), &body);
        if matches!(err, ApiError::Unauthorized { .. }) {
            if let Some(credential) = &credential {
                if self.inner.session.invalidate_if_current(credential) {
                    warn!(path, "Session rejected by server, logged out");
                }
            }
        } else {
            debug!(%method, path, status = status.as_u16(), message = %err, "Request rejected");
        }
        Err(err)
    }

    pub async fn get(&self, path: &str) -> ApiResult<Value> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.request(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.request(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }
}

/// Decodes a response body into `T`, mapping mismatches to `ApiError::Decode`.
pub fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(ApiError::from)
}
