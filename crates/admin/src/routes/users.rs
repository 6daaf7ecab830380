//! User management route handlers.
//!
//! Users are listed from the `Account` side table when roles live there,
//! otherwise from the auth directory. Role changes always go through the
//! `update-user-role` function, which updates the auth user's metadata; in
//! `account_table` mode the `Account.role` column is written as well.

use alpine_guardian_backend::{AuthContext, AuthUser, BackendError, RoleSource};
use alpine_guardian_core::models::Account;
use alpine_guardian_core::{Role, UserId};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;

use super::dashboard::AdminUserView;
use super::{FlashQuery, redirect_error, redirect_success};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// User row for the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub joined: String,
}

impl From<&Account> for UserRow {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone().unwrap_or_default(),
            full_name: account.full_name.clone().unwrap_or_default(),
            role: Role::from_stored(account.role.as_deref()),
            joined: account
                .created_date
                .map(|d| d.format("%b %d, %Y").to_string())
                .unwrap_or_default(),
        }
    }
}

impl From<&AuthUser> for UserRow {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone().unwrap_or_default(),
            full_name: user.full_name().unwrap_or_default().to_string(),
            role: Role::from_stored(user.metadata_role()),
            joined: user
                .created_at
                .as_deref()
                .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
                .map(|d| d.format("%b %d, %Y").to_string())
                .unwrap_or_default(),
        }
    }
}

/// Users page template.
#[derive(Template, WebTemplate)]
#[template(path = "users.html")]
pub struct UsersTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub users: Vec<UserRow>,
    pub source: String,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(index))
        .route("/users/{id}/role", post(update_role))
}

fn bearer(ctx: &AuthContext) -> Result<SecretString, BackendError> {
    ctx.bearer()
        .ok_or_else(|| BackendError::Function("Not signed in".to_string()))
}

/// Every user, from the side table or the auth directory.
///
/// # Errors
///
/// Returns the listing call's error.
pub async fn load_users(state: &AppState, ctx: &AuthContext) -> Result<Vec<UserRow>, BackendError> {
    let backend = state.backend();
    if backend.roles.source() == RoleSource::AccountTable {
        match ctx.data(backend).list_accounts().await {
            Ok(accounts) => return Ok(accounts.iter().map(UserRow::from).collect()),
            Err(e) if e.is_missing_table() => {
                tracing::warn!(error = %e, "Account table unavailable, listing auth users");
            }
            Err(e) => return Err(e),
        }
    }

    let users = backend.functions.list_users(&bearer(ctx)?).await?;
    Ok(users.iter().map(UserRow::from).collect())
}

/// GET /users
#[instrument(skip_all)]
async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let (users, load_error) = match load_users(&state, &ctx).await {
        Ok(users) => (users, None),
        Err(e) => {
            tracing::error!("Failed to fetch users: {e}");
            (Vec::new(), Some(e.to_string()))
        }
    };

    UsersTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/users".to_string(),
        users,
        source: state.backend().roles.source().to_string(),
        success_message: flash.success_message(&[("role_updated", "Role updated.")]),
        error_message: flash.error_message().or(load_error),
    }
}

/// POST /users/{id}/role
#[instrument(skip_all, fields(user_id = %id))]
async fn update_role(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => return redirect_error("/users", &e.to_string()),
    };

    match change_role(&state, &ctx, &id, role).await {
        Ok(()) => {
            tracing::info!(%role, "User role changed");
            redirect_success("/users", "role_updated")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to change role");
            redirect_error("/users", &e.to_string())
        }
    }
}

async fn change_role(
    state: &AppState,
    ctx: &AuthContext,
    id: &UserId,
    role: Role,
) -> Result<(), BackendError> {
    let backend = state.backend();
    backend
        .functions
        .update_user_role(id, role, &bearer(ctx)?)
        .await?;

    if backend.roles.source() == RoleSource::AccountTable {
        match ctx.data(backend).set_account_role(id, role).await {
            Ok(()) => {}
            Err(e) if e.is_missing_table() => {
                tracing::warn!(error = %e, "Account table unavailable, role kept in metadata only");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alpine_guardian_backend::{AuthEvent, AuthSession};
    use mockito::Matcher;
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    use crate::config::tests::test_config;

    fn state(server: &mockito::Server, source: RoleSource) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AppState::new(test_config(&server.url(), source), pool)
    }

    async fn signed_in(state: &AppState) -> AuthContext {
        let session: AuthSession = serde_json::from_value(json!({
            "access_token": "admin-jwt",
            "refresh_token": "ref-1",
            "expires_at": 4_000_000_000_i64,
            "user": {"id": "u-admin", "email": "lead@patrol.example", "user_metadata": {"role": "admin"}}
        }))
        .unwrap();
        let mut ctx = AuthContext::anonymous();
        ctx.apply(AuthEvent::SignedIn(session), state.backend()).await;
        ctx
    }

    #[tokio::test]
    async fn test_load_users_from_directory_in_metadata_mode() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("POST", "/functions/v1/list-users")
            .match_header("authorization", "Bearer admin-jwt")
            .with_status(200)
            .with_body(
                json!({"users": [
                    {"id": "u-1", "email": "a@patrol.example", "user_metadata": {"role": "admin"}},
                    {"id": "u-2", "email": "b@patrol.example"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let state = state(&server, RoleSource::Metadata);
        let ctx = signed_in(&state).await;

        let users = load_users(&state, &ctx).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[1].role, Role::User);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_change_role_writes_account_row_in_table_mode() {
        let mut server = mockito::Server::new_async().await;
        let function = server
            .mock("POST", "/functions/v1/update-user-role")
            .match_body(Matcher::PartialJson(json!({"userId": "u-2", "newRole": "admin"})))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/rest/v1/Account")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({"role": "admin"})))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let state = state(&server, RoleSource::AccountTable);
        let ctx = signed_in(&state).await;

        change_role(&state, &ctx, &UserId::new("u-2"), Role::Admin)
            .await
            .unwrap();
        function.assert_async().await;
        patch.assert_async().await;
    }

    #[test]
    fn test_row_from_account_defaults_role() {
        let account = Account {
            id: UserId::new("u-1"),
            email: Some("pat@example.com".to_string()),
            full_name: None,
            role: Some("superuser".to_string()),
            email_verified: None,
            created_date: "2026-01-05T10:00:00Z".parse().ok(),
            updated_date: None,
        };
        let row = UserRow::from(&account);
        assert_eq!(row.role, Role::User);
        assert_eq!(row.joined, "Jan 05, 2026");
        assert_eq!(row.full_name, "");
    }

    #[test]
    fn test_row_from_auth_user_reads_metadata() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "u-2",
            "email": "lead@patrol.example",
            "user_metadata": { "full_name": "Lead Patroller", "role": "admin" },
            "created_at": "2025-11-30T08:15:00Z"
        }))
        .unwrap();
        let row = UserRow::from(&user);
        assert_eq!(row.role, Role::Admin);
        assert_eq!(row.full_name, "Lead Patroller");
        assert_eq!(row.joined, "Nov 30, 2025");
    }
}
