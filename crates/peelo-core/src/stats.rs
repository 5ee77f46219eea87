//! # Profile Statistics
//!
//! Summary numbers shown on the profile page, derived on demand from the
//! raw order and address listings.
//!
//! ## Aggregation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET /orders/my-orders/ ──► ListEnvelope (bare | {orders}) ──┐          │
//! │                                                              │          │
//! │  GET /addresses/ ─────────► ListEnvelope (bare | {results}) ─┤          │
//! │                                                              ▼          │
//! │                                                   aggregate(orders,     │
//! │                                                             addresses)  │
//! │                                                              │          │
//! │                                                              ▼          │
//! │                          ProfileStats { total_orders, total_spent,      │
//! │                                         saved_addresses }               │
//! │                                                                         │
//! │  A bad `total_amount` on one order (malformed, negative, or one that   │
//! │  would overflow the running total) contributes zero.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::envelope::{list_items, ORDERS_FIELD, RESULTS_FIELD};
use crate::money::Money;
use crate::order::order_amount;

/// Derived, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub total_orders: usize,
    pub total_spent: Money,
    pub saved_addresses: usize,
}

/// Combines already-unwrapped order and address sequences.
pub fn aggregate(orders: &[Value], addresses: &[Value]) -> ProfileStats {
    ProfileStats {
        total_orders: orders.len(),
        total_spent: orders.iter().map(order_amount).fold(Money::zero(), |total, amount| {
            total.checked_add(amount).unwrap_or_else(|| {
                warn!(%amount, "Order amount overflows total spend, ignoring it");
                total
            })
        }),
        saved_addresses: addresses.len(),
    }
}

/// Combines raw response bodies, normalizing their envelopes first.
///
/// ```rust
/// use peelo_core::stats::aggregate_responses;
/// use serde_json::json;
///
/// let stats = aggregate_responses(
///     json!({"count": 2, "orders": [{"total_amount": "100.00"}, {"total_amount": 50}]}),
///     json!([{"id": 1}]),
/// );
/// assert_eq!(stats.total_orders, 2);
/// assert_eq!(stats.total_spent.paise(), 15000);
/// assert_eq!(stats.saved_addresses, 1);
/// ```
pub fn aggregate_responses(orders_body: Value, addresses_body: Value) -> ProfileStats {
    let orders = list_items(orders_body, &[ORDERS_FIELD]);
    let addresses = list_items(addresses_body, &[RESULTS_FIELD]);
    aggregate(&orders, &addresses)
}
