//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Health check
//! GET  /health/ready             - Readiness check (session database)
//!
//! # Auth (password sign-in, admin role required for every panel)
//! GET  /login                    - Login page
//! POST /login                    - Sign in
//! POST /logout                   - Sign out
//!
//! # Dashboard
//! GET  /                         - Store analytics
//!
//! # Products
//! GET  /products                 - Product listing
//! GET  /products/new             - New product form
//! POST /products                 - Create (multipart, optional template .zip)
//! GET  /products/{id}/edit       - Edit form
//! POST /products/{id}            - Update (multipart)
//! POST /products/{id}/delete     - Delete
//!
//! # Orders
//! GET  /orders                   - Order listing, newest first
//! POST /orders/{id}/status       - Set status
//! POST /orders/{id}/delete       - Delete
//!
//! # Reviews
//! GET  /reviews                  - Review listing, newest first
//! POST /reviews/{id}/status      - Set status
//! POST /reviews/{id}/delete      - Delete
//!
//! # Users
//! GET  /users                    - User listing
//! POST /users/{id}/role          - Change role
//!
//! # Settings
//! GET  /settings                 - Site settings form
//! POST /settings                 - Save site settings
//! ```
//!
//! Form posts answer with a redirect carrying `?success=<code>` or
//! `?error=<message>`, which the listing page turns into a banner.

pub mod auth;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod users;

use axum::{Router, response::Redirect, routing::get};
use serde::Deserialize;

use crate::state::AppState;

/// Build the admin panel routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .merge(auth::router())
        .merge(products::router())
        .merge(orders::router())
        .merge(reviews::router())
        .merge(users::router())
        .merge(settings::router())
}

/// `?success=` / `?error=` banner parameters.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    /// Map known success codes to messages; unknown codes are shown as-is.
    #[must_use]
    pub fn success_message(&self, known: &[(&str, &str)]) -> Option<String> {
        self.success.as_deref().map(|code| {
            known
                .iter()
                .find(|(k, _)| *k == code)
                .map_or_else(|| code.to_owned(), |(_, message)| (*message).to_owned())
        })
    }

    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.clone()
    }
}

/// One entry of a `<select>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub selected: bool,
}

/// Options for a `<select>`, marking the one equal to `current`.
#[must_use]
pub fn select_options(
    values: impl IntoIterator<Item = &'static str>,
    current: &str,
) -> Vec<SelectOption> {
    values
        .into_iter()
        .map(|value| SelectOption {
            value,
            selected: value == current,
        })
        .collect()
}

/// Redirect to `path` with a success code.
#[must_use]
pub fn redirect_success(path: &str, code: &str) -> Redirect {
    Redirect::to(&format!("{path}?success={}", encode(code)))
}

/// Redirect to `path` with an error message for the banner.
#[must_use]
pub fn redirect_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?error={}", encode(message)))
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
