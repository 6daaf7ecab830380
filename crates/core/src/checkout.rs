//! Payment line items built from the cart.

use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartLine};

/// Reasons checkout is refused before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Your cart is empty.")]
    EmptyCart,
    #[error("\"{product_name}\" has no payment price configured. Remove it or contact us to order.")]
    MissingPriceReference { product_name: String },
    #[error("Payments are not configured for this store.")]
    PaymentsNotConfigured,
}

/// One entry of the `create-checkout-session` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub price_id: String,
    pub quantity: u32,
    pub is_subscription: bool,
}

/// Payment price reference for a line: the recurring one for subscriptions,
/// the one-time one otherwise. Blank references count as missing.
#[must_use]
pub fn price_reference(line: &CartLine) -> Option<&str> {
    let reference = if line.product.is_subscription {
        line.product.stripe_recurring_price_id.as_deref()
    } else {
        line.product.stripe_price_id.as_deref()
    };
    reference.map(str::trim).filter(|r| !r.is_empty())
}

/// Map every cart line to a payment line item.
///
/// # Errors
///
/// Fails on an empty cart, or on the first line without the price reference
/// its billing mode needs.
pub fn build_line_items(cart: &Cart) -> Result<Vec<LineItem>, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    cart.lines()
        .iter()
        .map(|line| {
            let price_id =
                price_reference(line).ok_or_else(|| CheckoutError::MissingPriceReference {
                    product_name: line.product.name.clone(),
                })?;
            Ok(LineItem {
                price_id: price_id.to_string(),
                quantity: line.quantity,
                is_subscription: line.product.is_subscription,
            })
        })
        .collect()
}
