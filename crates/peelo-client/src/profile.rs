//! # Profile Service
//!
//! Account details, order history and the statistics card on the profile
//! page.
//!
//! ## Profile Page Data
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  fetch_profile() ──────► GET /users/profile/ ────► User                │
//! │                                                                         │
//! │  update_full_name() ───► PUT /users/profile/ ────► User (session too)  │
//! │                                                                         │
//! │  fetch_stats() ──┬─────► GET /orders/my-orders/ ─┐                      │
//! │                  │                               ├─► aggregate()        │
//! │                  └─────► GET /addresses/ ────────┘   ProfileStats       │
//! │                          (both in flight at once)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use peelo_core::envelope::{decode_list, list_items, ORDERS_FIELD, RESULTS_FIELD};
use peelo_core::stats::{aggregate, ProfileStats};
use peelo_core::validation::validate_full_name;
use peelo_core::{OrderFilter, OrderSummary, User};

use crate::error::{ApiError, ApiResult};
use crate::http::{decode, HttpClient, Method, RequestOptions};
use crate::session::SessionCell;

pub const PROFILE_PATH: &str = "/users/profile/";
pub const ORDERS_PATH: &str = "/orders/my-orders/";
pub const ADDRESSES_PATH: &str = "/addresses/";

/// Returned without a request when no one is logged in.
const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to continue.";

#[derive(Clone)]
pub struct ProfileService {
    http: HttpClient,
    cell: Arc<SessionCell>,
}

impl ProfileService {
    pub fn new(http: HttpClient, cell: Arc<SessionCell>) -> Self {
        Self { http, cell }
    }

    /// Fetches the account and refreshes the session's copy of it.
    pub async fn fetch_profile(&self) -> ApiResult<User> {
        self.require_session()?;
        let user: User = decode(self.http.get(PROFILE_PATH).await?)?;
        self.cell.update_user(user.clone());
        Ok(user)
    }

    /// Renames the account. Blank or over-long names never reach the server.
    pub async fn update_full_name(&self, full_name: &str) -> ApiResult<User> {
        validate_full_name(full_name)?;
        self.require_session()?;

        let body = json!({ "full_name": full_name.trim() });
        let user: User = decode(self.http.put(PROFILE_PATH, &body).await?)?;
        self.cell.update_user(user.clone());
        info!("Profile updated");
        Ok(user)
    }

    /// Lists past orders, newest first, optionally filtered by status.
    pub async fn fetch_orders(&self, filter: OrderFilter) -> ApiResult<Vec<OrderSummary>> {
        let body = self.orders_body(filter).await?;
        let orders: Vec<OrderSummary> = decode_list(body, &[ORDERS_FIELD]);
        debug!(%filter, count = orders.len(), "Fetched orders");
        Ok(orders)
    }

    /// Saved delivery addresses as raw records.
    pub async fn fetch_addresses(&self) -> ApiResult<Vec<Value>> {
        self.require_session()?;
        let body = self.http.get(ADDRESSES_PATH).await?;
        Ok(list_items(body, &[RESULTS_FIELD]))
    }

    /// Fetches orders and addresses concurrently and aggregates them.
    pub async fn fetch_stats(&self) -> ApiResult<ProfileStats> {
        self.require_session()?;
        let (orders, addresses) =
            tokio::try_join!(self.orders_body(OrderFilter::All), self.fetch_addresses())?;

        let orders = list_items(orders, &[ORDERS_FIELD]);
        let stats = aggregate(&orders, &addresses);
        debug!(
            total_orders = stats.total_orders,
            saved_addresses = stats.saved_addresses,
            "Computed profile stats"
        );
        Ok(stats)
    }

    async fn orders_body(&self, filter: OrderFilter) -> ApiResult<Value> {
        self.require_session()?;
        let mut options = RequestOptions::default();
        if let Some(status) = filter.as_query() {
            options = options.query("status", status);
        }
        self.http
            .request(Method::GET, ORDERS_PATH, None, options)
            .await
    }

    fn require_session(&self) -> ApiResult<()> {
        if self.cell.snapshot().is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized {
                message: LOGIN_REQUIRED_MESSAGE.to_string(),
            })
        }
    }
}
