//! Session-held shopping cart.
//!
//! The cart is a plain value: handlers load it from the browsing session,
//! mutate it, and write the whole thing back before responding.
//!
//! Lines are keyed by product id. Adding a product that is already in the
//! cart only bumps the quantity; the first snapshot (price and selections)
//! is kept.

use serde::{Deserialize, Serialize};

use crate::models::{OrderItem, Product, Selections};
use crate::types::{Price, ProductId};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// The product fields a cart line needs after the catalog is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub is_subscription: bool,
    pub stripe_price_id: Option<String>,
    pub stripe_recurring_price_id: Option<String>,
}

impl From<&Product> for ProductSnapshot {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            image: p.image.clone(),
            is_subscription: p.is_subscription,
            stripe_price_id: p.stripe_price_id.clone(),
            stripe_recurring_price_id: p.stripe_recurring_price_id.clone(),
        }
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductSnapshot,
    pub quantity: u32,
    /// Base price plus selected option adjustments, resolved when added.
    pub unit_price: Price,
    #[serde(default)]
    pub selections: Selections,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Human-readable selections, e.g. `Band: UHF, Case: Hard`.
    #[must_use]
    pub fn selections_label(&self) -> String {
        self.selections
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add `quantity` of a product. Selections that do not match the
    /// product's variations are dropped before the price is resolved.
    ///
    /// A zero quantity is ignored.
    pub fn add(&mut self, product: &Product, selections: &Selections, quantity: u32) {
        if quantity == 0 {
            return;
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
            return;
        }

        let selections = product.valid_selections(selections);
        self.lines.push(CartLine {
            product: ProductSnapshot::from(product),
            quantity,
            unit_price: product.price_with(&selections),
            selections,
        });
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if no line has this product id.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return if self.remove(id) {
                Ok(())
            } else {
                Err(CartError::NotInCart(id.clone()))
            };
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| &l.product.id == id)
            .ok_or_else(|| CartError::NotInCart(id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product.id != id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Σ(unit price × quantity).
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Σ quantity.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Lines in the shape stored on an `Order` row.
    #[must_use]
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|l| OrderItem {
                id: l.product.id.clone(),
                name: l.product.name.clone(),
                price: l.unit_price,
                quantity: l.quantity,
                image: l.product.image.clone(),
                selected_variations: (!l.selections.is_empty()).then(|| l.selections.clone()),
            })
            .collect()
    }
}
