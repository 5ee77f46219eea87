//! # Domain Types
//!
//! Core domain types for the PeelO storefront client.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Domain Model                                     │
//! │                                                                         │
//! │  ┌─────────────┐      ┌──────────────┐      ┌──────────────────────┐   │
//! │  │   Session   │      │    Branch    │      │       Product        │   │
//! │  │ ─────────── │      │ ──────────── │      │ ──────────────────── │   │
//! │  │ Anonymous   │      │ id           │ 1..* │ id, name, price      │   │
//! │  │ Authenticat.│      │ name, city   │─────►│ image, category      │   │
//! │  │  user       │      │ hours        │      │ is_available, stock  │   │
//! │  │  credential │      └──────────────┘      └──────────┬───────────┘   │
//! │  └─────────────┘                                       │ snapshot      │
//! │                                                        ▼               │
//! │                                             ┌──────────────────────┐   │
//! │                                             │  CartLine (cart.rs)  │   │
//! │                                             └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names follow the REST API (`snake_case`), so every type here
//! decodes straight from a response body and persists in the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{self, Money};

/// Server-side primary key. The REST API uses integer ids throughout.
pub type EntityId = i64;

// =============================================================================
// Users & Sessions
// =============================================================================

/// An authenticated account as returned by `/users/profile/` and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Absent in the trimmed user object embedded in the login response.
    #[serde(default)]
    pub id: Option<EntityId>,

    pub email: String,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub phone_number: Option<String>,

    #[serde(default)]
    pub is_email_verified: bool,

    #[serde(default)]
    pub is_phone_verified: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name to greet the user with; falls back to the email local part.
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if !name.is_empty() {
            return name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Opaque bearer credential issued at login.
///
/// `Debug` never prints token material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Credential {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Authentication state of the process.
///
/// ## Invariant
/// A credential exists if and only if a user exists. Modelled as an enum so
/// the two can never drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user: User, credential: Credential },
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { user, .. } => Some(user),
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { credential, .. } => Some(credential),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }
}

// =============================================================================
// Branches & Catalog
// =============================================================================

/// A physical store. The selected branch scopes catalog queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: EntityId,
    pub name: String,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub pincode: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// "HH:MM:SS" as sent by the API
    #[serde(default)]
    pub opening_time: Option<String>,

    #[serde(default)]
    pub closing_time: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
}

/// A sellable product as listed by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub name: String,

    /// Unit price; the API sends a decimal string or a number.
    #[serde(with = "money::wire")]
    pub price: Money,

    #[serde(default)]
    pub description: Option<String>,

    /// Absolute URL or path relative to the media host.
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default = "default_true")]
    pub is_available: bool,

    #[serde(default)]
    pub category: Option<Category>,

    #[serde(default)]
    pub net_quantity_ml: Option<u32>,

    /// Units on hand when the listing reports it; caps cart quantities.
    #[serde(default)]
    pub stock: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_decodes_string_price() {
        let product: Product = serde_json::from_value(json!({
            "id": 7,
            "name": "Carrot Juice",
            "price": "60.00",
            "image": "/media/carrot.png",
            "category": {"id": 1, "name": "Cold Pressed"}
        }))
        .unwrap();

        assert_eq!(product.price, Money::from_rupees(60));
        assert!(product.is_available);
        assert_eq!(product.stock, None);
        assert_eq!(product.category.unwrap().name, "Cold Pressed");
    }

    #[test]
    fn test_user_from_login_payload() {
        // Login embeds a trimmed user without id/timestamps
        let user: User = serde_json::from_value(json!({
            "email": "asha@example.com",
            "full_name": "",
            "phone_number": "9876543210"
        }))
        .unwrap();

        assert_eq!(user.id, None);
        assert_eq!(user.display_name(), "asha");
    }

    #[test]
    fn test_credential_debug_redacts() {
        let cred = Credential::new("secret.jwt.value", Some("refresh-me".into()));
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("secret"));
        assert!(!printed.contains("refresh-me"));
    }

    #[test]
    fn test_session_accessors() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(session.credential().is_none());
    }

    #[test]
    fn test_branch_defaults_active() {
        let branch: Branch = serde_json::from_value(json!({"id": 2, "name": "Indiranagar"})).unwrap();
        assert!(branch.is_active);
        assert_eq!(branch.city, None);
    }
}
