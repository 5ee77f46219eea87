//! # Order History Types
//!
//! Read-only view of the user's past orders as listed by `/orders/my-orders/`.
//! Orders are created server-side at checkout; the client only lists them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::money::Money;
use crate::types::EntityId;

/// Field carrying an order's grand total.
pub const AMOUNT_FIELD: &str = "total_amount";

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
    /// Any status this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Still moving through the kitchen or delivery.
    pub fn is_ongoing(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Preparing
                | OrderStatus::OutForDelivery
        )
    }
}

/// Server-side filter accepted by the order listing (`?status=`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderFilter {
    #[default]
    All,
    Ongoing,
    Delivered,
    Cancelled,
}

impl OrderFilter {
    /// Query value, or `None` for the unfiltered listing.
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            OrderFilter::All => None,
            OrderFilter::Ongoing => Some("ongoing"),
            OrderFilter::Delivered => Some("delivered"),
            OrderFilter::Cancelled => Some("cancelled"),
        }
    }
}

impl fmt::Display for OrderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query().unwrap_or("all"))
    }
}

/// One row of the order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: EntityId,

    #[serde(default)]
    pub order_number: Option<String>,

    #[serde(default = "unknown_status")]
    pub status: OrderStatus,

    /// `None` when the amount is missing or unparseable.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total_amount: Option<Money>,

    #[serde(default)]
    pub created_at: Option<String>,
}

fn unknown_status() -> OrderStatus {
    OrderStatus::Unknown
}

impl OrderSummary {
    /// Amount counted towards spend; zero when unknown.
    pub fn amount(&self) -> Money {
        self.total_amount.unwrap_or_default()
    }
}

/// Never fails: a bad amount must not discard the whole order row.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Money::from_json(&value))
}

/// Extracts the spendable amount of a raw order record.
///
/// Missing, non-numeric and negative amounts all count as zero.
pub fn order_amount(order: &Value) -> Money {
    order
        .get(AMOUNT_FIELD)
        .and_then(Money::from_json)
        .filter(|amount| !amount.is_negative())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parsing() {
        let status: OrderStatus = serde_json::from_value(json!("out_for_delivery")).unwrap();
        assert_eq!(status, OrderStatus::OutForDelivery);
        assert!(status.is_ongoing());

        let status: OrderStatus = serde_json::from_value(json!("refunded")).unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        assert!(!status.is_ongoing());
    }

    #[test]
    fn test_filter_query_values() {
        assert_eq!(OrderFilter::All.as_query(), None);
        assert_eq!(OrderFilter::Ongoing.as_query(), Some("ongoing"));
        assert_eq!(OrderFilter::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_summary_tolerates_bad_amount() {
        let order: OrderSummary = serde_json::from_value(json!({
            "id": 11,
            "status": "delivered",
            "total_amount": "not-a-number"
        }))
        .unwrap();
        assert_eq!(order.total_amount, None);
        assert_eq!(order.amount(), Money::zero());
    }

    #[test]
    fn test_order_amount_from_raw() {
        assert_eq!(order_amount(&json!({"total_amount": "250.50"})).paise(), 25050);
        assert_eq!(order_amount(&json!({"total_amount": 99})).paise(), 9900);
        assert_eq!(order_amount(&json!({"total_amount": null})), Money::zero());
        assert_eq!(order_amount(&json!({"total_amount": "-5"})), Money::zero());
        assert_eq!(order_amount(&json!({})), Money::zero());
        assert_eq!(order_amount(&json!("garbage")), Money::zero());
    }
}
