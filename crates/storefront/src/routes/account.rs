//! Account route handlers.
//!
//! These routes require authentication. Orders belong to a visitor through
//! the email they were placed with.

use alpine_guardian_backend::{AuthContext, AuthEvent, BackendError};
use alpine_guardian_core::models::{AccountProfilePatch, Order};
use alpine_guardian_core::{Email, OrderId, OrderStatus};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, Viewer};
use crate::models::{load_cart, save_auth};
use crate::pages::Page;
use crate::routes::not_found_page;
use crate::state::AppState;
use crate::views::{OrderItemRow, OrderRow, Shell, short_reference};

/// Orders listed on the dashboard.
const RECENT_ORDERS: usize = 5;

async fn my_orders(state: &AppState, ctx: &AuthContext) -> Result<Vec<Order>> {
    let email = ctx
        .email()
        .ok_or_else(|| AppError::Unauthorized("no email on account".to_string()))?;
    Ok(ctx.data(state.backend()).orders_for_email(email).await?)
}

// =============================================================================
// Dashboard
// =============================================================================

/// Order counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

impl OrderStats {
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        Self {
            total: orders.len(),
            pending: orders.iter().filter(|o| o.is(OrderStatus::Pending)).count(),
            completed: orders
                .iter()
                .filter(|o| o.is(OrderStatus::Completed))
                .count(),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "account/dashboard.html")]
pub struct DashboardTemplate {
    pub shell: Shell,
    pub stats: OrderStats,
    pub recent: Vec<OrderRow>,
    pub error: Option<String>,
}

/// Display the signed-in visitor's dashboard.
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    session: Session,
) -> impl IntoResponse {
    let (orders, error) = match my_orders(&state, &ctx).await {
        Ok(orders) => (orders, None),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load orders");
            (Vec::new(), Some(e.to_string()))
        }
    };

    let cart = load_cart(&session).await;
    DashboardTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        stats: OrderStats::from_orders(&orders),
        recent: orders.iter().take(RECENT_ORDERS).map(OrderRow::from).collect(),
        error,
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub shell: Shell,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub editable: bool,
    pub saved: bool,
    pub error: Option<String>,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    pub email: String,
}

impl ProfileForm {
    /// # Errors
    ///
    /// Returns the message to show on the form.
    pub fn validate(&self) -> std::result::Result<(String, Email), String> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err("Please enter your full name.".to_string());
        }
        let email = Email::parse(&self.email).map_err(|e| e.to_string())?;
        Ok((name.to_string(), email))
    }
}

/// `?saved=1` after a successful update.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub saved: Option<String>,
}

const TABLE_UNAVAILABLE: &str = "Account table is missing or not ready.";

async fn render_profile(
    state: &AppState,
    ctx: &AuthContext,
    session: &Session,
    form: Option<ProfileForm>,
    saved: bool,
    error: Option<String>,
) -> Response {
    let (full_name, email) = match form {
        Some(form) => (form.full_name, form.email),
        None => {
            let account = ctx.account();
            let full_name = account
                .and_then(|a| a.full_name.clone())
                .or_else(|| ctx.user().and_then(|u| u.full_name()).map(String::from))
                .unwrap_or_default();
            let email = account
                .and_then(|a| a.email.clone())
                .or_else(|| ctx.email().map(String::from))
                .unwrap_or_default();
            (full_name, email)
        }
    };

    let cart = load_cart(session).await;
    ProfileTemplate {
        shell: Shell::build(state, ctx, &cart).await,
        full_name,
        email,
        role: ctx.role().unwrap_or_default().to_string(),
        editable: ctx.account_table_present() == Some(true),
        saved,
        error,
    }
    .into_response()
}

/// Display the profile.
#[instrument(skip(state, ctx, session))]
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    session: Session,
    Query(query): Query<ProfileQuery>,
) -> Response {
    let error = (ctx.account_table_present() == Some(false)).then(|| TABLE_UNAVAILABLE.to_string());
    render_profile(&state, &ctx, &session, None, query.saved.is_some(), error).await
}

/// Save `full_name` and `email` on the visitor's account row.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(mut ctx): RequireUser,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let backend = state.backend();
    if !backend.roles.account_table_present().await {
        let error = Some(TABLE_UNAVAILABLE.to_string());
        return Ok(render_profile(&state, &ctx, &session, Some(form), false, error).await);
    }
    let (full_name, email) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            return Ok(render_profile(&state, &ctx, &session, Some(form), false, Some(message)).await);
        }
    };
    let Some(user) = ctx.user().cloned() else {
        return Err(AppError::Unauthorized("sign in to edit your profile".to_string()));
    };

    let patch = AccountProfilePatch {
        full_name,
        email: email.into_inner(),
        updated_date: Utc::now(),
    };
    match ctx
        .data(backend)
        .update_account_profile(&user.id, &patch)
        .await
    {
        Ok(_) => {
            tracing::info!(user_id = %user.id, "Profile updated");
            // Re-resolve so the stored account row reflects the change.
            ctx.apply(AuthEvent::UserUpdated(user), backend).await;
            save_auth(&session, &ctx).await?;
            Ok(Redirect::to(&format!("{}?saved=1", Page::UserProfile.path())).into_response())
        }
        Err(BackendError::NotFound(_)) => {
            let error = Some("No account record exists for you yet.".to_string());
            Ok(render_profile(&state, &ctx, &session, Some(form), false, error).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to update profile");
            Ok(render_profile(&state, &ctx, &session, Some(form), false, Some(e.to_string())).await)
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub shell: Shell,
    pub orders: Vec<OrderRow>,
    pub error: Option<String>,
}

/// Display the visitor's orders, newest first.
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    session: Session,
) -> impl IntoResponse {
    let (orders, error) = match my_orders(&state, &ctx).await {
        Ok(orders) => (orders.iter().map(OrderRow::from).collect(), None),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load orders");
            (Vec::new(), Some(e.to_string()))
        }
    };

    let cart = load_cart(&session).await;
    OrdersTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        orders,
        error,
    }
}

/// Order detail display data.
#[derive(Clone)]
pub struct OrderDetailView {
    pub reference: String,
    pub date: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<OrderItemRow>,
    pub total: String,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        let row = OrderRow::from(order);
        Self {
            reference: short_reference(order.id.as_str()),
            date: row.date,
            status: row.status,
            customer_name: if order.customer_name.is_empty() {
                "N/A".to_string()
            } else {
                order.customer_name.clone()
            },
            customer_email: order.customer_email.clone(),
            items: order.items.iter().map(OrderItemRow::from).collect(),
            total: row.total,
        }
    }
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderTemplate {
    pub shell: Shell,
    pub order: OrderDetailView,
}

/// `?id=` parameter.
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub id: Option<String>,
}

/// Display one of the visitor's orders. Orders placed under another email
/// are reported as not found.
#[instrument(skip(state, ctx, session))]
pub async fn order(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    session: Session,
    Query(query): Query<OrderQuery>,
) -> Result<Response> {
    let Some(id) = query.id.filter(|id| !id.trim().is_empty()) else {
        return Ok(not_found_page(&state, &ctx, &session).await);
    };

    let order = ctx
        .data(state.backend())
        .get_order(&OrderId::new(id.trim()))
        .await?;
    let visible = order.filter(|o| {
        ctx.email()
            .is_some_and(|email| o.customer_email.eq_ignore_ascii_case(email))
    });
    let Some(order) = visible else {
        return Ok(not_found_page(&state, &ctx, &session).await);
    };

    let cart = load_cart(&session).await;
    Ok(OrderTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        order: OrderDetailView::from(&order),
    }
    .into_response())
}

// =============================================================================
// Admin hand-off
// =============================================================================

/// Admins go to the back-office; everyone else to their dashboard.
#[instrument(skip_all)]
pub async fn admin_dashboard(State(state): State<AppState>, Viewer(ctx): Viewer) -> Redirect {
    if ctx.is_admin() {
        Redirect::to(&state.config().admin_url)
    } else {
        Redirect::to(Page::Dashboard.path())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(status: &str) -> Order {
        serde_json::from_value(json!({
            "id": "a1b2c3d4-0000",
            "customer_email": "sam@resort.com",
            "items": [],
            "total": 0.0,
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn test_order_stats() {
        let orders = vec![
            order("pending"),
            order("completed"),
            order("pending"),
            order("refunded"),
        ];
        let stats = OrderStats::from_orders(&orders);
        assert_eq!(
            stats,
            OrderStats {
                total: 4,
                pending: 2,
                completed: 1,
            }
        );
    }

    #[test]
    fn test_order_detail_defaults_missing_name() {
        let detail = OrderDetailView::from(&order("completed"));
        assert_eq!(detail.reference, "A1B2C3D4");
        assert_eq!(detail.customer_name, "N/A");
        assert_eq!(detail.status, "completed");
    }

    #[test]
    fn test_profile_form_validation() {
        let form = ProfileForm {
            full_name: "  ".to_string(),
            email: "sam@resort.com".to_string(),
        };
        assert!(form.validate().is_err());

        let form = ProfileForm {
            full_name: "Sam".to_string(),
            email: "SAM@resort.com".to_string(),
        };
        let (_, email) = form.validate().unwrap();
        assert!(email.as_str().eq_ignore_ascii_case("sam@resort.com"));
    }
}
