//! # peelo-client: Storefront Client Layer
//!
//! Stateful stores for the PeelO juice storefront, backed by its REST API.
//!
//! ## Store Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Storefront (app.rs)                            │
//! │                                                                         │
//! │   SessionStore ──┐                                                      │
//! │   ProfileService ┼──► SessionCell ◄── HttpClient (bearer, forced logout)│
//! │                  │         │                                            │
//! │                  │         ▼ session-end hook                           │
//! │                  │   CartStore logout policy                            │
//! │                                                                         │
//! │   BranchStore ──watch──► CatalogFeed follower                           │
//! │                                                                         │
//! │   ToastNotifier (independent timers)                                    │
//! │                                                                         │
//! │   Storage: cart.json · branch.json · session.json                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`http`]: REST transport and error mapping
//! - [`session`]: Login, logout, startup restore
//! - [`branch`]: Selected branch with generation tracking
//! - [`catalog`]: Branch-scoped product listing
//! - [`cart`]: Observable, persisted cart
//! - [`profile`]: Account details, orders and profile statistics
//! - [`toast`]: Transient notifications
//! - [`config`]: TOML + environment configuration
//! - [`storage`]: Key/value persistence

pub mod app;
pub mod branch;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod profile;
pub mod session;
pub mod storage;
pub mod toast;

pub use app::{Restored, Storefront};
pub use branch::{BranchState, BranchStore};
pub use cart::CartStore;
pub use catalog::{CatalogFeed, CatalogState, LoadOutcome};
pub use config::{CartLogoutPolicy, ClientConfig};
pub use error::{
    ApiError, ApiErrorKind, ApiResult, ConfigError, ConfigResult, StartupError, StartupResult,
    StorageError, StorageResult,
};
pub use http::{HttpClient, RequestOptions};
pub use profile::ProfileService;
pub use session::{SessionCell, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage};
pub use toast::{Toast, ToastKind, ToastNotifier};
