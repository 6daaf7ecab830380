//! Dashboard route handler.

use alpine_guardian_backend::AuthContext;
use alpine_guardian_core::models::Order;
use alpine_guardian_core::{OrderStatus, Price};
use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::middleware::RequireAdmin;
use crate::routes::users::load_users;
use crate::state::AppState;

/// Signed-in admin, shown in the layout header.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
    pub storefront_url: String,
}

impl AdminUserView {
    #[must_use]
    pub fn new(ctx: &AuthContext, state: &AppState) -> Self {
        Self {
            name: ctx.user().map(|u| u.display_name()).unwrap_or_default(),
            email: ctx.email().unwrap_or_default().to_string(),
            storefront_url: state.config().storefront_url.clone(),
        }
    }
}

/// Store-wide numbers for the analytics tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardMetrics {
    pub products: usize,
    pub users: usize,
    pub orders: usize,
    pub revenue: Price,
    pub completed: usize,
    pub pending: usize,
    pub cancelled: usize,
}

impl DashboardMetrics {
    /// Revenue sums every order's total regardless of status.
    #[must_use]
    pub fn new(products: usize, users: usize, orders: &[Order]) -> Self {
        let count = |status: OrderStatus| orders.iter().filter(|o| o.is(status)).count();
        Self {
            products,
            users,
            orders: orders.len(),
            revenue: orders.iter().map(|o| o.total).sum(),
            completed: count(OrderStatus::Completed),
            pending: count(OrderStatus::Pending),
            cancelled: count(OrderStatus::Cancelled),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub metrics: DashboardMetrics,
    pub errors: Vec<String>,
}

/// Dashboard page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let data = ctx.data(state.backend());
    let (products, orders, users) = tokio::join!(
        data.list_products(),
        data.list_orders(),
        load_users(&state, &ctx),
    );

    let mut errors = Vec::new();
    let products = products.map_or_else(
        |e| {
            tracing::error!("Failed to fetch products: {e}");
            errors.push(format!("Products: {e}"));
            0
        },
        |p| p.len(),
    );
    let orders = orders.unwrap_or_else(|e| {
        tracing::error!("Failed to fetch orders: {e}");
        errors.push(format!("Orders: {e}"));
        Vec::new()
    });
    let users = users.map_or_else(
        |e| {
            tracing::error!("Failed to fetch users: {e}");
            errors.push(format!("Users: {e}"));
            0
        },
        |u| u.len(),
    );

    DashboardTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/".to_string(),
        metrics: DashboardMetrics::new(products, users, &orders),
        errors,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alpine_guardian_core::OrderId;

    fn order(id: &str, cents: i64, status: &str) -> Order {
        Order {
            id: OrderId::new(id),
            customer_name: "Pat".to_string(),
            customer_email: "pat@example.com".to_string(),
            items: Vec::new(),
            total: Price::from_cents(cents),
            status: status.to_string(),
            created_date: None,
        }
    }

    #[test]
    fn test_metrics_count_statuses_and_sum_revenue() {
        let orders = vec![
            order("1", 10_000, "completed"),
            order("2", 2_550, "pending"),
            order("3", 1_000, "cancelled"),
            order("4", 500, "shipped"),
        ];
        let metrics = DashboardMetrics::new(12, 3, &orders);

        assert_eq!(metrics.products, 12);
        assert_eq!(metrics.users, 3);
        assert_eq!(metrics.orders, 4);
        assert_eq!(metrics.revenue, Price::from_cents(14_050));
        assert_eq!(
            (metrics.completed, metrics.pending, metrics.cancelled),
            (1, 1, 1)
        );
    }

    #[test]
    fn test_metrics_empty_store() {
        let metrics = DashboardMetrics::new(0, 0, &[]);
        assert_eq!(metrics.orders, 0);
        assert!(metrics.revenue.is_zero());
    }
}
