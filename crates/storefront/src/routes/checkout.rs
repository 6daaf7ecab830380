//! Checkout page, payment hand-off and order placement.
//!
//! Paying online is one round-trip to the `create-checkout-session`
//! function followed by a redirect to the hosted payment page. Every refusal
//! that can be decided locally (empty cart, a line without a price
//! reference, no publishable key) is shown before any remote call.

use alpine_guardian_backend::AuthContext;
use alpine_guardian_backend::functions::CheckoutSession;
use alpine_guardian_core::cart::Cart;
use alpine_guardian_core::checkout::{CheckoutError, build_line_items};
use alpine_guardian_core::models::NewOrder;
use alpine_guardian_core::{Email, OrderStatus};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::Viewer;
use crate::models::{load_cart, save_cart};
use crate::state::AppState;
use crate::views::{CartView, Shell, short_reference};

/// Manual order form data.
#[derive(Debug, Default, Deserialize)]
pub struct OrderForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub shell: Shell,
    pub cart: CartView,
    pub payments_enabled: bool,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
}

/// Page that hands the session to the payment provider's browser library.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/handoff.html")]
pub struct HandoffTemplate {
    pub publishable_key: String,
    pub session_id: String,
}

/// Manual order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/placed.html")]
pub struct OrderPlacedTemplate {
    pub shell: Shell,
    pub email: String,
    pub reference: String,
}

/// Payment success template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub shell: Shell,
    pub session_id: Option<String>,
}

/// Payment cancelled template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/cancel.html")]
pub struct CheckoutCancelTemplate {
    pub shell: Shell,
}

async fn render_checkout(
    state: &AppState,
    ctx: &AuthContext,
    cart: &Cart,
    error: Option<String>,
    form: OrderForm,
) -> Response {
    let name = if form.name.is_empty() {
        ctx.user().map(|u| u.display_name()).unwrap_or_default()
    } else {
        form.name
    };
    let email = if form.email.is_empty() {
        ctx.email().unwrap_or_default().to_string()
    } else {
        form.email
    };

    CheckoutTemplate {
        shell: Shell::build(state, ctx, cart).await,
        cart: CartView::from(cart),
        payments_enabled: state.config().stripe_publishable_key.is_some(),
        error,
        name,
        email,
    }
    .into_response()
}

/// Display the cart with checkout actions.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    render_checkout(&state, &ctx, &cart, None, OrderForm::default()).await
}

/// Create a payment session and send the visitor to the hosted page.
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> Response {
    let cart = load_cart(&session).await;

    let items = match build_line_items(&cart) {
        Ok(items) => items,
        Err(e) => {
            tracing::info!(error = %e, "Checkout refused");
            return render_checkout(&state, &ctx, &cart, Some(e.to_string()), OrderForm::default())
                .await;
        }
    };
    let Some(publishable_key) = state.config().stripe_publishable_key.clone() else {
        tracing::warn!("Checkout attempted without STRIPE_PUBLISHABLE_KEY");
        let message = CheckoutError::PaymentsNotConfigured.to_string();
        return render_checkout(&state, &ctx, &cart, Some(message), OrderForm::default()).await;
    };

    let bearer = ctx.session().map(|s| s.bearer());
    let result = state
        .backend()
        .functions
        .create_checkout_session(&items, ctx.email(), bearer.as_ref())
        .await;

    match result {
        Ok(CheckoutSession {
            url: Some(url),
            session_id,
        }) => {
            add_breadcrumb("checkout", "Payment session created", Some(&[("session_id", session_id.as_str())]));
            Redirect::to(&url).into_response()
        }
        Ok(CheckoutSession { session_id, .. }) => {
            add_breadcrumb("checkout", "Payment session created", Some(&[("session_id", session_id.as_str())]));
            HandoffTemplate {
                publishable_key,
                session_id,
            }
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create payment session");
            render_checkout(&state, &ctx, &cart, Some(e.to_string()), OrderForm::default()).await
        }
    }
}

/// Validate the manual order form.
///
/// # Errors
///
/// Returns the message to show next to the form.
pub fn validate_order_form(form: &OrderForm) -> std::result::Result<(String, Email), String> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err("Please enter your name.".to_string());
    }
    let email = Email::parse(&form.email).map_err(|e| e.to_string())?;
    Ok((name.to_string(), email))
}

/// Place an order for the cart without paying online, then clear the cart.
#[instrument(skip_all)]
pub async fn place_order(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Form(form): Form<OrderForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if cart.is_empty() {
        let message = CheckoutError::EmptyCart.to_string();
        return Ok(render_checkout(&state, &ctx, &cart, Some(message), form).await);
    }
    let (name, email) = match validate_order_form(&form) {
        Ok(valid) => valid,
        Err(message) => return Ok(render_checkout(&state, &ctx, &cart, Some(message), form).await),
    };

    let order = NewOrder {
        customer_name: name,
        customer_email: email.as_str().to_string(),
        items: cart.to_order_items(),
        total: cart.subtotal(),
        status: OrderStatus::Pending,
    };

    let created = match ctx.data(state.backend()).create_order(&order).await {
        Ok(created) => created,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to place order");
            return Ok(render_checkout(&state, &ctx, &cart, Some(e.to_string()), form).await);
        }
    };
    tracing::info!(order_id = %created.id, total = %created.total, "Order placed");

    cart.clear();
    save_cart(&session, &cart).await?;

    Ok(OrderPlacedTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        email: email.into_inner(),
        reference: short_reference(created.id.as_str()),
    }
    .into_response())
}

/// Query string the payment provider appends on return.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// Payment completed: clear the cart.
#[instrument(skip(state, ctx, session))]
pub async fn success(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let cart = Cart::new();
    save_cart(&session, &cart).await?;

    Ok(CheckoutSuccessTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        session_id: query.session_id.filter(|s| !s.is_empty()),
    }
    .into_response())
}

/// Payment abandoned: the cart is kept.
#[instrument(skip_all)]
pub async fn cancel(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    CheckoutCancelTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_order_form() {
        let form = |name: &str, email: &str| OrderForm {
            name: name.to_string(),
            email: email.to_string(),
        };

        let (name, email) = validate_order_form(&form(" Sam Rider ", "sam@resort.com")).unwrap();
        assert_eq!(name, "Sam Rider");
        assert_eq!(email.as_str(), "sam@resort.com");

        assert!(validate_order_form(&form("", "sam@resort.com")).is_err());
        assert!(validate_order_form(&form("Sam", "not-an-email")).is_err());
    }
}
