//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Health check
//! GET  /health/ready             - Readiness check (session database)
//!
//! # Pages (each also at /<PageName>, see `pages`)
//! GET  /                         - Landing page
//! GET  /StoreFront               - Catalog with search, price range and sort
//! GET  /ProductDetail?id=        - Product detail with reviews
//! GET  /Checkout                 - Cart and checkout
//! GET  /checkout/success         - Payment completed (clears the cart)
//! GET  /checkout/cancel          - Payment abandoned (keeps the cart)
//! GET  /CustomLogin              - Sign in
//! GET  /CustomSignup             - Sign up
//! GET  /ForgotPassword           - Request a reset email
//! GET  /ResetPassword            - Set a new password
//! GET  /Dashboard                - Order stats (requires auth)
//! GET  /UserProfile              - Profile (requires auth)
//! GET  /OrderHistory             - Orders by email (requires auth)
//! GET  /OrderDetails?id=         - One order (requires auth)
//! GET  /AdminDashboard           - Redirect to the admin binary
//!
//! # Actions
//! POST /cart/add                 - Add a product with selections
//! POST /cart/update              - Set a line quantity (0 removes)
//! POST /cart/remove              - Remove a line
//! POST /checkout/pay             - Create a payment session and redirect
//! POST /checkout/order           - Place an order without online payment
//! POST /reviews                  - Submit a review (requires auth)
//! POST /logout                   - Sign out
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod store;

use alpine_guardian_backend::AuthContext;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use tower_sessions::Session;

use crate::middleware::Viewer;
use crate::models::load_cart;
use crate::pages::page_routes;
use crate::state::AppState;
use crate::views::Shell;

/// Not-found page template.
#[derive(Template, WebTemplate)]
#[template(path = "errors/not_found.html")]
pub struct NotFoundTemplate {
    pub shell: Shell,
}

/// Render the not-found page with a 404 status.
pub async fn not_found_page(state: &AppState, ctx: &AuthContext, session: &Session) -> Response {
    let cart = load_cart(session).await;
    let shell = Shell::build(state, ctx, &cart).await;
    (StatusCode::NOT_FOUND, NotFoundTemplate { shell }).into_response()
}

/// Fallback for unknown paths.
pub async fn not_found(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> Response {
    not_found_page(&state, &ctx, &session).await
}

/// Create the cart action routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout action routes router. Registered at full paths since
/// the return pages share the `/checkout` prefix.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/pay", post(checkout::pay))
        .route("/checkout/order", post(checkout::place_order))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(page_routes())
        .nest("/cart", cart_routes())
        .merge(checkout_routes())
        .route("/reviews", post(store::submit_review))
        .route("/logout", post(auth::logout))
}
