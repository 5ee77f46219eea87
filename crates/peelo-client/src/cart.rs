//! # Cart Store
//!
//! Observable, persisted wrapper around [`peelo_core::Cart`].
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add / set_quantity / remove / clear                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  send_if_modified(|cart| rule applied in full)                          │
//! │       │ changed?                                                        │
//! │       ├── no  ──► nothing persisted, nobody notified                    │
//! │       ▼ yes                                                             │
//! │  subscribers notified ──► cart.json rewritten                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart belongs to the device, not the account: logging in keeps it,
//! logging out keeps or empties it per [`CartLogoutPolicy`].

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use peelo_core::{Cart, CartLine, CartTotals, CoreError, EntityId, Money, Product};

use crate::config::CartLogoutPolicy;
use crate::error::ApiResult;
use crate::session::SessionCell;
use crate::storage::{persist_json, restore_json, SharedStorage, CART_KEY};

#[derive(Clone)]
pub struct CartStore {
    tx: Arc<watch::Sender<Cart>>,
    storage: SharedStorage,
}

impl CartStore {
    /// Creates the store with the cart persisted last run, if any.
    pub fn new(storage: SharedStorage) -> Self {
        let cart: Cart = restore_json(storage.as_ref(), CART_KEY).unwrap_or_default();
        if !cart.is_empty() {
            debug!(lines = cart.lines().len(), "Restored persisted cart");
        }
        let (tx, _) = watch::channel(cart);
        Self {
            tx: Arc::new(tx),
            storage,
        }
    }

    /// Adds `quantity` of `product`; returns the line's resulting quantity.
    pub fn add(&self, product: &Product, quantity: i64) -> ApiResult<u32> {
        let mut outcome: Result<u32, CoreError> = Ok(0);
        let changed = self.tx.send_if_modified(|cart| {
            let before = cart.line(product.id).map(|l| l.quantity);
            outcome = cart.add(product, quantity);
            matches!(outcome, Ok(after) if before != Some(after))
        });
        let quantity = outcome?;
        if changed {
            debug!(product_id = product.id, quantity, "Added to cart");
            self.persist();
        }
        Ok(quantity)
    }

    /// Overwrites a line's quantity; `≤ 0` removes the line.
    pub fn set_quantity(&self, product_id: EntityId, quantity: i64) -> ApiResult<()> {
        let mut outcome: Result<(), CoreError> = Ok(());
        let changed = self.tx.send_if_modified(|cart| {
            let before = cart.line(product_id).map(|l| l.quantity);
            outcome = cart.set_quantity(product_id, quantity);
            outcome.is_ok() && before != cart.line(product_id).map(|l| l.quantity)
        });
        outcome?;
        if changed {
            self.persist();
        }
        Ok(())
    }

    pub fn remove(&self, product_id: EntityId) -> bool {
        let removed = self.tx.send_if_modified(|cart| cart.remove(product_id));
        if removed {
            debug!(product_id, "Removed from cart");
            self.persist();
        }
        removed
    }

    pub fn clear(&self) {
        let cleared = self.tx.send_if_modified(|cart| {
            if cart.is_empty() {
                return false;
            }
            cart.clear();
            true
        });
        if cleared {
            info!("Cart cleared");
            self.persist();
        }
    }

    /// Σ quantity, recomputed on every read.
    pub fn count(&self) -> u64 {
        self.tx.borrow().count()
    }

    pub fn total(&self) -> Money {
        self.tx.borrow().total()
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.tx.borrow().lines().to_vec()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(&*self.tx.borrow())
    }

    pub fn snapshot(&self) -> Cart {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.tx.subscribe()
    }

    /// Applies `policy` whenever an authenticated session ends, whether by
    /// explicit logout or a forced one.
    ///
    /// The cart is emptied inside the session transition, before the
    /// logout returns, so a login that follows can never see the old cart.
    pub fn apply_logout_policy(&self, cell: &SessionCell, policy: CartLogoutPolicy) {
        if policy != CartLogoutPolicy::Clear {
            return;
        }
        let store = self.clone();
        cell.on_session_end(move || {
            debug!("Session ended, clearing cart");
            store.clear();
        });
    }

    fn persist(&self) {
        let cart = self.tx.borrow().clone();
        if cart.is_empty() {
            persist_json::<Cart>(self.storage.as_ref(), CART_KEY, None);
        } else {
            persist_json(self.storage.as_ref(), CART_KEY, Some(&cart));
        }
    }
}
