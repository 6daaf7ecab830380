//! Authentication route handlers.
//!
//! Password sign-in and sign-up against the hosted auth service, sign-out,
//! and the two-step password reset (email link, then new password).
//! Auth service messages are shown on the form verbatim.

use alpine_guardian_backend::auth::{SignUpOutcome, UserUpdate};
use alpine_guardian_backend::{AuthContext, AuthEvent};
use alpine_guardian_core::Email;
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

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::Viewer;
use crate::models::{load_cart, save_auth};
use crate::pages::Page;
use crate::state::AppState;
use crate::views::Shell;

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub shell: Shell,
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub shell: Shell,
    pub full_name: String,
    pub email: String,
    pub error: Option<String>,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub shell: Shell,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub shell: Shell,
    pub token_hash: String,
    pub error: Option<String>,
}

// =============================================================================
// Form data
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Sign-up form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupForm {
    /// Trimmed name and parsed email.
    ///
    /// # Errors
    ///
    /// Returns the message to show on the form.
    pub fn validate(&self) -> std::result::Result<(String, Email), String> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err("Please enter your full name.".to_string());
        }
        let email = Email::parse(&self.email).map_err(|e| e.to_string())?;
        validate_new_password(&self.password, &self.password_confirm)?;
        Ok((name.to_string(), email))
    }
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token_hash: String,
    pub password: String,
    pub password_confirm: String,
}

/// Notices shown on the login page after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub confirm: Option<String>,
    pub reset: Option<String>,
}

/// Recovery link parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ResetQuery {
    pub token_hash: Option<String>,
}

fn validate_new_password(password: &str, confirm: &str) -> std::result::Result<(), String> {
    if password.is_empty() {
        return Err("Please enter a password.".to_string());
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

// =============================================================================
// Login / logout
// =============================================================================

/// Display the login page. Signed-in visitors go to the dashboard.
#[instrument(skip(state, ctx, session))]
pub async fn login_page(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    if ctx.is_authenticated() {
        return Redirect::to(Page::Dashboard.path()).into_response();
    }
    let notice = if query.confirm.is_some() {
        Some("Check your email to confirm your account, then sign in.".to_string())
    } else if query.reset.is_some() {
        Some("Password updated successfully. Please sign in.".to_string())
    } else {
        None
    };

    let cart = load_cart(&session).await;
    LoginTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        email: String::new(),
        error: None,
        notice,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, ctx, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    Viewer(mut ctx): Viewer,
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
            tracing::info!(error = %e, "Login failed");
            let cart = load_cart(&session).await;
            return Ok(LoginTemplate {
                shell: Shell::build(&state, &ctx, &cart).await,
                email: email.to_string(),
                error: Some(e.to_string()),
                notice: None,
            }
            .into_response());
        }
    };

    ctx.apply(AuthEvent::SignedIn(auth_session), state.backend())
        .await;
    establish(&session, &ctx).await?;

    Ok(Redirect::to(Page::Dashboard.path()).into_response())
}

/// Store a freshly signed-in context under a new session id.
async fn establish(session: &Session, ctx: &AuthContext) -> Result<()> {
    session.cycle_id().await?;
    save_auth(session, ctx).await?;
    if let Some(user) = ctx.user() {
        set_sentry_user(&user.id, user.email.as_deref());
        tracing::info!(user_id = %user.id, role = ?ctx.role(), "Signed in");
    }
    Ok(())
}

/// Sign out. The cart stays with the browsing session.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    Viewer(mut ctx): Viewer,
    session: Session,
) -> Result<Response> {
    ctx.sign_out(state.backend()).await;
    save_auth(&session, &ctx).await?;
    clear_sentry_user();

    Ok(Redirect::to(Page::Home.path()).into_response())
}

// =============================================================================
// Sign-up
// =============================================================================

async fn render_signup(
    state: &AppState,
    ctx: &AuthContext,
    session: &Session,
    form: &SignupForm,
    error: String,
) -> Response {
    let cart = load_cart(session).await;
    SignupTemplate {
        shell: Shell::build(state, ctx, &cart).await,
        full_name: form.full_name.clone(),
        email: form.email.clone(),
        error: Some(error),
    }
    .into_response()
}

/// Display the sign-up page.
#[instrument(skip_all)]
pub async fn signup_page(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> Response {
    if ctx.is_authenticated() {
        return Redirect::to(Page::Dashboard.path()).into_response();
    }
    let cart = load_cart(&session).await;
    SignupTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        full_name: String::new(),
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Handle sign-up form submission.
#[instrument(skip(state, ctx, session, form), fields(email = %form.email))]
pub async fn signup(
    State(state): State<AppState>,
    Viewer(mut ctx): Viewer,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let (full_name, email) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => return Ok(render_signup(&state, &ctx, &session, &form, message).await),
    };

    let redirect_to = state.config().absolute(Page::Dashboard.path());
    let outcome = state
        .backend()
        .auth
        .sign_up(email.as_str(), &form.password, &full_name, Some(&redirect_to))
        .await;

    match outcome {
        Ok(SignUpOutcome::SignedIn(auth_session)) => {
            ctx.apply(AuthEvent::SignedIn(*auth_session), state.backend())
                .await;
            establish(&session, &ctx).await?;
            Ok(Redirect::to(Page::Dashboard.path()).into_response())
        }
        Ok(SignUpOutcome::ConfirmationRequired(user)) => {
            tracing::info!(user_id = %user.id, "Sign-up awaiting email confirmation");
            Ok(Redirect::to(&format!("{}?confirm=1", Page::CustomLogin.path())).into_response())
        }
        Err(e) => {
            tracing::info!(error = %e, "Sign-up failed");
            Ok(render_signup(&state, &ctx, &session, &form, e.to_string()).await)
        }
    }
}

// =============================================================================
// Password reset
// =============================================================================

/// Display the forgot password page.
#[instrument(skip_all)]
pub async fn forgot_password_page(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    ForgotPasswordTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        error: None,
        notice: None,
    }
}

/// Send a reset email whose link lands on the reset page.
#[instrument(skip(state, ctx, session, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> impl IntoResponse {
    let redirect_to = state.config().absolute(Page::ResetPassword.path());
    let result = match Email::parse(&form.email) {
        Ok(email) => state
            .backend()
            .auth
            .recover(email.as_str(), &redirect_to)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let (error, notice) = match result {
        Ok(()) => (
            None,
            Some("Check your email for a password reset link.".to_string()),
        ),
        Err(message) => (Some(message), None),
    };

    let cart = load_cart(&session).await;
    ForgotPasswordTemplate {
        shell: Shell::build(&state, &ctx, &cart).await,
        error,
        notice,
    }
}

async fn render_reset(
    state: &AppState,
    ctx: &AuthContext,
    session: &Session,
    token_hash: String,
    error: Option<String>,
) -> Response {
    let cart = load_cart(session).await;
    ResetPasswordTemplate {
        shell: Shell::build(state, ctx, &cart).await,
        token_hash,
        error,
    }
    .into_response()
}

/// Display the new password form, carrying the recovery token from the
/// email link.
#[instrument(skip_all)]
pub async fn reset_password_page(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Query(query): Query<ResetQuery>,
) -> Response {
    let token_hash = query.token_hash.unwrap_or_default();
    render_reset(&state, &ctx, &session, token_hash, None).await
}

/// Set the new password, then send the visitor to sign in with it.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Viewer(mut ctx): Viewer,
    session: Session,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let token_hash = form.token_hash.trim().to_string();
    if let Err(message) = validate_new_password(&form.password, &form.password_confirm) {
        return Ok(render_reset(&state, &ctx, &session, token_hash, Some(message)).await);
    }

    let backend = state.backend();
    if !token_hash.is_empty() {
        match backend.auth.verify_recovery(&token_hash).await {
            Ok(recovery) => ctx.apply(AuthEvent::SignedIn(recovery), backend).await,
            Err(e) => {
                tracing::info!(error = %e, "Recovery link rejected");
                return Ok(render_reset(&state, &ctx, &session, token_hash, Some(e.to_string())).await);
            }
        }
    }

    let Some(bearer) = ctx.session().map(|s| s.bearer()) else {
        let message = "Open the link from your reset email to set a new password.".to_string();
        return Ok(render_reset(&state, &ctx, &session, token_hash, Some(message)).await);
    };

    let update = UserUpdate {
        password: Some(form.password.clone()),
        ..UserUpdate::default()
    };
    match backend.auth.update_user(&bearer, &update).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Password updated");
            ctx.apply(AuthEvent::UserUpdated(user), backend).await;
        }
        Err(e) => {
            tracing::info!(error = %e, "Password update failed");
            save_auth(&session, &ctx).await?;
            return Ok(render_reset(&state, &ctx, &session, String::new(), Some(e.to_string())).await);
        }
    }

    ctx.sign_out(backend).await;
    save_auth(&session, &ctx).await?;
    clear_sentry_user();

    Ok(Redirect::to(&format!("{}?reset=1", Page::CustomLogin.path())).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signup_form(name: &str, email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            full_name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_signup_passwords_must_match() {
        let form = signup_form("Sam Rider", "sam@resort.com", "hunter22", "hunter23");
        assert_eq!(form.validate().unwrap_err(), "Passwords do not match");
    }

    #[test]
    fn test_signup_requires_name_and_email() {
        assert!(signup_form(" ", "sam@resort.com", "pw", "pw").validate().is_err());
        assert!(signup_form("Sam", "sam", "pw", "pw").validate().is_err());

        let (name, email) = signup_form(" Sam ", "sam@resort.com", "pw", "pw")
            .validate()
            .unwrap();
        assert_eq!(name, "Sam");
        assert_eq!(email.as_str(), "sam@resort.com");
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("", "").is_err());
        assert!(validate_new_password("a", "b").is_err());
        assert!(validate_new_password("same", "same").is_ok());
    }
}
