//! Order management route handlers.
//!
//! Any status can be set from any other; the last write wins.

use alpine_guardian_core::models::Order;
use alpine_guardian_core::{OrderId, OrderStatus};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use super::dashboard::AdminUserView;
use super::{FlashQuery, SelectOption, redirect_error, redirect_success, select_options};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Order row for the listing.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub date: String,
    pub customer_name: String,
    pub customer_email: String,
    pub items: String,
    pub total: String,
    pub status: String,
    pub status_options: Vec<SelectOption>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            date: order
                .created_date
                .map(|d| d.format("%b %d, %Y %H:%M").to_string())
                .unwrap_or_default(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            items: order
                .items
                .iter()
                .map(|i| format!("{} x{}", i.name, i.quantity))
                .collect::<Vec<_>>()
                .join(", "),
            total: order.total.display(),
            status: order.status.clone(),
            status_options: select_options(
                OrderStatus::ALL.iter().map(OrderStatus::as_str),
                &order.status,
            ),
        }
    }
}

/// Orders page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders.html")]
pub struct OrdersTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub orders: Vec<OrderRow>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}/status", post(update_status))
        .route("/orders/{id}/delete", post(delete))
}

const MESSAGES: &[(&str, &str)] = &[
    ("status_updated", "Order status updated."),
    ("deleted", "Order deleted."),
];

/// GET /orders
#[instrument(skip_all)]
async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let (orders, load_error) = match ctx.data(state.backend()).list_orders().await {
        Ok(orders) => (orders.iter().map(OrderRow::from).collect(), None),
        Err(e) => {
            tracing::error!("Failed to fetch orders: {e}");
            (Vec::new(), Some(e.to_string()))
        }
    };

    OrdersTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/orders".to_string(),
        orders,
        success_message: flash.success_message(MESSAGES),
        error_message: flash.error_message().or(load_error),
    }
}

/// POST /orders/{id}/status
#[instrument(skip_all, fields(order_id = %id))]
async fn update_status(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let status = match form.status.parse::<OrderStatus>() {
        Ok(status) => status,
        Err(e) => return redirect_error("/orders", &e.to_string()),
    };

    match ctx
        .data(state.backend())
        .set_order_status(&id, status)
        .await
    {
        Ok(_) => {
            tracing::info!(%status, "Order status changed");
            redirect_success("/orders", "status_updated")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to update order status");
            redirect_error("/orders", &e.to_string())
        }
    }
}

/// POST /orders/{id}/delete
#[instrument(skip_all, fields(order_id = %id))]
async fn delete(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Redirect {
    match ctx.data(state.backend()).delete_order(&id).await {
        Ok(()) => {
            tracing::info!("Order deleted");
            redirect_success("/orders", "deleted")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete order");
            redirect_error("/orders", &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpine_guardian_core::models::OrderItem;
    use alpine_guardian_core::{Price, ProductId};

    #[test]
    fn test_order_row_summarises_items() {
        let order = Order {
            id: OrderId::new("17"),
            customer_name: "Robin".to_string(),
            customer_email: "robin@example.com".to_string(),
            items: vec![
                OrderItem {
                    id: ProductId::new("p1"),
                    name: "Avalanche Kit".to_string(),
                    price: Price::from_cents(12_000),
                    quantity: 2,
                    image: None,
                    selected_variations: None,
                },
                OrderItem {
                    id: ProductId::new("p2"),
                    name: "Radio Beacon".to_string(),
                    price: Price::from_cents(4_500),
                    quantity: 1,
                    image: None,
                    selected_variations: None,
                },
            ],
            total: Price::from_cents(28_500),
            status: "pending".to_string(),
            created_date: None,
        };

        let row = OrderRow::from(&order);
        assert_eq!(row.items, "Avalanche Kit x2, Radio Beacon x1");
        assert_eq!(row.total, "$285.00");
        assert_eq!(row.date, "");
    }
}
