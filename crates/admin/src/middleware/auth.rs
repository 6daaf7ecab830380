//! Authentication middleware and extractors for admin.
//!
//! Every panel requires a signed-in visitor whose resolved role is `admin`.
//! The role is resolved again on each panel request, so a demotion takes
//! effect on the next page load.

use alpine_guardian_backend::AuthContext;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{load_auth, save_auth};
use crate::state::AppState;

/// Shown to signed-in visitors who are not admins.
#[derive(Template, WebTemplate)]
#[template(path = "access_denied.html")]
pub struct AccessDeniedTemplate {
    pub dashboard_url: String,
}

/// Error returned when admin authentication is required.
pub enum AdminAuthRejection {
    /// Not signed in.
    RedirectToLogin,
    /// Signed in without the admin role.
    AccessDenied { dashboard_url: String },
    /// No session layer in front of the handler.
    Unauthorized,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::AccessDenied { dashboard_url } => (
                StatusCode::FORBIDDEN,
                AccessDeniedTemplate { dashboard_url },
            )
                .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// The signed-in visitor's context, whatever their role.
pub struct OptionalAdmin(pub AuthContext);

impl FromRequestParts<AppState> for OptionalAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AdminAuthRejection::Unauthorized)?;

        let mut ctx = load_auth(&session).await;
        if ctx.ensure_fresh(state.backend()).await {
            if let Err(e) = save_auth(&session, &ctx).await {
                tracing::error!(error = %e, "Failed to store refreshed auth context");
            }
        }

        Ok(Self(ctx))
    }
}

/// Extractor that requires a signed-in admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(ctx): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", ctx.email().unwrap_or("admin"))
/// }
/// ```
pub struct RequireAdmin(pub AuthContext);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAdmin(mut ctx) = OptionalAdmin::from_request_parts(parts, state).await?;

        if !ctx.is_authenticated() {
            return Err(AdminAuthRejection::RedirectToLogin);
        }

        if ctx.refresh_role(state.backend()).await {
            if let Some(session) = parts.extensions.get::<Session>() {
                if let Err(e) = save_auth(session, &ctx).await {
                    tracing::error!(error = %e, "Failed to store re-resolved role");
                }
            }
        }
        if !ctx.is_admin() {
            tracing::warn!(
                user_id = ?ctx.user().map(|u| u.id.to_string()),
                "Non-admin denied access"
            );
            return Err(AdminAuthRejection::AccessDenied {
                dashboard_url: state.config().storefront("/Dashboard"),
            });
        }

        Ok(Self(ctx))
    }
}
