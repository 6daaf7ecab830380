//! Visitor extractors.
//!
//! [`Viewer`] hydrates the visitor's [`AuthContext`] from the session and
//! refreshes a nearly expired access token before the handler runs, so
//! handlers never observe a half-resolved context. [`RequireUser`] also
//! insists on a signed-in visitor.

use alpine_guardian_backend::AuthContext;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::clear_sentry_user;
use crate::models::{load_auth, save_auth};
use crate::pages::Page;
use crate::state::AppState;

/// Error returned when a signed-in visitor is required.
pub enum AuthRejection {
    /// Redirect to login page.
    RedirectToLogin,
    /// No session layer in front of the handler.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(Page::CustomLogin.path()).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// The current visitor, signed in or not.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(Viewer(ctx): Viewer) -> impl IntoResponse {
///     match ctx.user() {
///         Some(user) => format!("Hello, {}!", user.display_name()),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct Viewer(pub AuthContext);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        let mut ctx = load_auth(&session).await;
        if ctx.ensure_fresh(state.backend()).await {
            if !ctx.is_authenticated() {
                clear_sentry_user();
            }
            if let Err(e) = save_auth(&session, &ctx).await {
                tracing::error!(error = %e, "Failed to store refreshed auth context");
            }
        }

        Ok(Self(ctx))
    }
}

/// A signed-in visitor. Anonymous visitors are sent to the login page.
pub struct RequireUser(pub AuthContext);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Viewer(ctx) = Viewer::from_request_parts(parts, state).await?;
        if ctx.is_authenticated() {
            Ok(Self(ctx))
        } else {
            Err(AuthRejection::RedirectToLogin)
        }
    }
}
