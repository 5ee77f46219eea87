//! # Response Envelopes
//!
//! List endpoints of the storefront API are not consistent about shape. This
//! module normalizes them once, at the boundary, so stores and aggregators
//! only ever see a `Vec`.
//!
//! ## Accepted Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Body                                  ListEnvelope       Items        │
//! │  ────                                  ────────────       ─────        │
//! │  [ {...}, {...} ]                      Bare               2            │
//! │  { "orders": [ {...} ], "count": 1 }   Wrapped("orders")  1            │
//! │  { "results": [ ... ] }                Wrapped("results") n            │
//! │  { "detail": "..." } / null / 42       Empty              0            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Field wrapping the order listing.
pub const ORDERS_FIELD: &str = "orders";

/// Field wrapping paginated catalog and branch listings.
pub const RESULTS_FIELD: &str = "results";

/// The recognized shape of a list response.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEnvelope {
    /// The body itself is the sequence.
    Bare(Vec<Value>),
    /// The sequence sits under a known field of an object.
    Wrapped { field: &'static str, items: Vec<Value> },
    /// Neither shape; treated as an empty list.
    Empty,
}

impl ListEnvelope {
    /// Classifies `body`, looking for the sequence under each of `fields` in
    /// order when the body is an object.
    pub fn classify(body: Value, fields: &[&'static str]) -> Self {
        match body {
            Value::Array(items) => ListEnvelope::Bare(items),
            Value::Object(mut map) => {
                for &field in fields {
                    if let Some(Value::Array(items)) = map.remove(field) {
                        return ListEnvelope::Wrapped { field, items };
                    }
                }
                ListEnvelope::Empty
            }
            _ => ListEnvelope::Empty,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Wrapped { items, .. } => items,
            ListEnvelope::Empty => Vec::new(),
        }
    }
}

/// Returns the raw items of a list response.
pub fn list_items(body: Value, fields: &[&'static str]) -> Vec<Value> {
    ListEnvelope::classify(body, fields).into_items()
}

/// Decodes each item of a list response into `T`.
///
/// A record that fails to decode is skipped with a warning; one bad record
/// never discards the rest of the listing.
pub fn decode_list<T: DeserializeOwned>(body: Value, fields: &[&'static str]) -> Vec<T> {
    list_items(body, fields)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<T>(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed list record");
                None
            }
        })
        .collect()
}
