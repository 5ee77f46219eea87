//! # Cart Rules
//!
//! Pure shopping cart logic. The async store in `peelo-client` wraps a
//! [`Cart`] in a watch channel and persists it; every rule lives here.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Page Action              Cart Method             Line Change           │
//! │  ───────────              ───────────             ───────────           │
//! │                                                                         │
//! │  "Add to cart" ──────────► add(product, n) ─────► merge or push         │
//! │                                                   (capped)              │
//! │  Quantity stepper ───────► set_quantity(id, n) ─► overwrite (capped)   │
//! │                                                   n ≤ 0 ⇒ remove        │
//! │  Trash icon ─────────────► remove(id) ──────────► retain others         │
//! │                                                                         │
//! │  Badge / summary ────────► count(), total() ────► (derived, read only) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id`
//! - Every line has quantity ≥ 1
//! - `count` and `total` are never stored, only derived

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{EntityId, Product};
use crate::validation::validate_quantity;
use crate::MAX_LINE_QUANTITY;

// =============================================================================
// Cart Line
// =============================================================================

/// One product in the cart.
///
/// ## Price Freezing
/// `product` is a snapshot taken when the line was created. Later catalog
/// refreshes do not reprice lines already in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: EntityId,
    pub product: Product,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn from_product(product: &Product, quantity: u32) -> Self {
        CartLine {
            product_id: product.id,
            product: product.clone(),
            quantity,
            added_at: Utc::now(),
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.product.price.multiply_quantity(self.quantity)
    }
}

/// Highest quantity a single line may hold for `product`.
///
/// Known stock wins; otherwise the global per-line ceiling applies.
pub fn quantity_cap(product: &Product) -> u32 {
    match product.stock {
        Some(stock) => stock.min(MAX_LINE_QUANTITY),
        None => MAX_LINE_QUANTITY,
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An ordered sequence of cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CartSnapshot")]
pub struct Cart {
    lines: Vec<CartLine>,
}

/// Persisted shape; normalized on the way in so a hand-edited or older
/// snapshot cannot break the invariants.
#[derive(Deserialize)]
struct CartSnapshot {
    #[serde(default)]
    lines: Vec<CartLine>,
}

impl From<CartSnapshot> for Cart {
    fn from(snapshot: CartSnapshot) -> Self {
        let mut cart = Cart::new();
        for line in snapshot.lines {
            if line.quantity == 0 {
                continue;
            }
            let cap = quantity_cap(&line.product);
            match cart.lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity).min(cap);
                }
                None => {
                    let quantity = line.quantity.min(cap);
                    if quantity > 0 {
                        cart.lines.push(CartLine { quantity, ..line });
                    }
                }
            }
        }
        cart
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Adds `quantity` of `product`, merging into an existing line.
    ///
    /// ## Behavior
    /// - Product already in cart: quantity increases, capped at
    ///   [`quantity_cap`]
    /// - Product not in cart: appended as a new line
    /// - `quantity ≤ 0`: rejected, cart unchanged
    /// - Nothing to sell (unavailable or zero stock): rejected
    ///
    /// ## Returns
    /// The resulting quantity of the product's line.
    pub fn add(&mut self, product: &Product, quantity: i64) -> CoreResult<u32> {
        let quantity = validate_quantity(quantity)?;
        let cap = quantity_cap(product);
        if !product.is_available || cap == 0 {
            return Err(CoreError::OutOfStock(product.id));
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = line.quantity.saturating_add(quantity).min(cap);
            return Ok(line.quantity);
        }

        let line = CartLine::from_product(product, quantity.min(cap));
        let resulting = line.quantity;
        self.lines.push(line);
        Ok(resulting)
    }

    /// Overwrites the quantity of an existing line.
    ///
    /// ## Behavior
    /// - `quantity ≤ 0`: identical to [`Cart::remove`] (absent product is a no-op)
    /// - Product not in cart: `CoreError::ProductNotInCart`
    /// - Otherwise capped like [`Cart::add`]
    pub fn set_quantity(&mut self, product_id: EntityId, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            self.remove(product_id);
            return Ok(());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CoreError::ProductNotInCart(product_id))?;

        let requested = u32::try_from(quantity).unwrap_or(u32::MAX);
        line.quantity = requested.min(quantity_cap(&line.product)).max(1);
        Ok(())
    }

    /// Removes a line. Returns whether a line was removed.
    pub fn remove(&mut self, product_id: EntityId) -> bool {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != initial_len
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: EntityId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Σ quantity over all lines.
    pub fn count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Σ quantity × unit price over all lines.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Cart totals summary for badges and order summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub line_count: usize,
    pub item_count: u64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.lines.len(),
            item_count: cart.count(),
            total: cart.total(),
        }
    }
}
