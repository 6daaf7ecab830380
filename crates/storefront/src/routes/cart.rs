//! Cart route handlers.
//!
//! The cart lives in the browsing session. Every action loads it, applies
//! one mutation, writes it back and returns to the checkout page.

use alpine_guardian_core::ProductId;
use alpine_guardian_core::models::Selections;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{load_cart, save_cart};
use crate::pages::Page;
use crate::routes::store::SELECTION_FIELD_PREFIX;
use crate::state::AppState;

/// Parsed add-to-cart form.
///
/// The form posts `product_id`, an optional `quantity` and one
/// `opt:<variation>` field per selector, so it arrives as raw pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: u32,
    pub selections: Selections,
}

impl AddToCart {
    /// Parse the raw form pairs.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` without a product id or with a
    /// non-numeric quantity.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut product_id = None;
        let mut quantity = 1;
        let mut selections = Selections::new();

        for (key, value) in pairs {
            if let Some(name) = key.strip_prefix(SELECTION_FIELD_PREFIX) {
                if !value.is_empty() {
                    selections.insert(name.to_string(), value);
                }
                continue;
            }
            match key.as_str() {
                "product_id" => product_id = Some(ProductId::new(value.trim())),
                "quantity" if !value.trim().is_empty() => {
                    quantity = value
                        .trim()
                        .parse()
                        .map_err(|_| AppError::BadRequest("invalid quantity".to_string()))?;
                }
                _ => {}
            }
        }

        let product_id = product_id
            .filter(|id| !id.as_str().is_empty())
            .ok_or_else(|| AppError::BadRequest("missing product".to_string()))?;

        Ok(Self {
            product_id,
            quantity,
            selections,
        })
    }
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

/// Add a product to the cart.
#[instrument(skip(state, session, pairs))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let request = AddToCart::from_pairs(pairs)?;
    let product = state
        .backend()
        .data
        .get_product(&request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

    let mut cart = load_cart(&session).await;
    cart.add(&product, &request.selections, request.quantity);
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", request.product_id.as_str())]),
    );
    tracing::debug!(product_id = %request.product_id, items = cart.item_count(), "Cart updated");

    Ok(Redirect::to(Page::Checkout.path()).into_response())
}

/// Set a line's quantity; zero removes it.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if let Err(e) = cart.set_quantity(&ProductId::new(form.product_id), form.quantity) {
        // Stale form from another tab; the cart already reflects the change.
        tracing::debug!(error = %e, "Ignoring cart update");
    }
    save_cart(&session, &cart).await?;

    Ok(Redirect::to(Page::Checkout.path()).into_response())
}

/// Remove a line.
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.remove(&ProductId::new(form.product_id));
    save_cart(&session, &cart).await?;

    Ok(Redirect::to(Page::Checkout.path()).into_response())
}
