//! Landing page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::middleware::Viewer;
use crate::models::load_cart;
use crate::routes::store::load_ratings;
use crate::state::AppState;
use crate::views::{ProductCard, Shell};

/// Products featured on the landing page.
const FEATURED_COUNT: usize = 3;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub shell: Shell,
    pub featured: Vec<ProductCard>,
}

/// Display the landing page with the newest products.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    let shell = Shell::build(&state, &ctx, &cart).await;

    let data = &state.backend().data;
    let featured = match data.list_products().await {
        Ok(products) => {
            let ratings = load_ratings(data).await;
            products
                .iter()
                .take(FEATURED_COUNT)
                .map(|p| ProductCard::new(p, &ratings))
                .collect()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    };

    HomeTemplate { shell, featured }
}
