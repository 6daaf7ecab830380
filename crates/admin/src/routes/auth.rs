//! Authentication route handlers for admin.
//!
//! Admins sign in with the same email and password they use on the
//! storefront. Any account can sign in; the panels then require the admin
//! role.

use alpine_guardian_backend::AuthEvent;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::OptionalAdmin;
use crate::models::save_auth;
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

/// GET /login
#[instrument(skip_all)]
async fn login_page(OptionalAdmin(ctx): OptionalAdmin) -> Response {
    if ctx.is_admin() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        email: ctx.email().unwrap_or_default().to_string(),
        error: None,
    }
    .into_response()
}

/// POST /login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    OptionalAdmin(mut ctx): OptionalAdmin,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let email = form.email.trim();
    let auth_session = match state
        .backend()
        .auth
        .sign_in_with_password(email, &form.password)
        .await
    {
        Ok(auth_session) => auth_session,
        Err(e) => {
            tracing::info!(error = %e, "Admin login failed");
            return Ok(LoginTemplate {
                email: email.to_string(),
                error: Some(e.to_string()),
            }
            .into_response());
        }
    };

    ctx.apply(AuthEvent::SignedIn(auth_session), state.backend())
        .await;
    session.cycle_id().await?;
    save_auth(&session, &ctx).await?;

    if let Some(user) = ctx.user() {
        set_sentry_user(&user.id, user.email.as_deref());
        tracing::info!(user_id = %user.id, role = ?ctx.role(), "Admin panel sign-in");
    }

    Ok(Redirect::to("/").into_response())
}

/// POST /logout
#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    OptionalAdmin(mut ctx): OptionalAdmin,
    session: Session,
) -> Result<Redirect> {
    ctx.sign_out(state.backend()).await;
    save_auth(&session, &ctx).await?;
    clear_sentry_user();

    Ok(Redirect::to("/login"))
}
