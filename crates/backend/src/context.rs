//! Per-visitor auth context.
//!
//! An `AuthContext` is created for each browsing session, kept in the session
//! store between requests, and driven by [`AuthEvent`]s. Every event that
//! changes who the visitor is re-resolves the role; signing out resets it to
//! the anonymous state.

use alpine_guardian_core::Role;
use alpine_guardian_core::models::Account;
use chrono::Utc;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Backend;
use crate::auth::{AuthSession, AuthUser};
use crate::data::DataClient;

/// Refresh the access token when it expires within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Auth state changes.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    UserUpdated(AuthUser),
    SignedOut,
}

/// Who the visitor is and what they may do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    session: Option<AuthSession>,
    role: Option<Role>,
    account: Option<Account>,
    account_table_present: Option<bool>,
}

impl AuthContext {
    /// The signed-out context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// `None` when signed out.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        self.role
    }

    #[must_use]
    pub const fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    /// Side-table presence as of the last resolution; `None` if never probed.
    #[must_use]
    pub const fn account_table_present(&self) -> Option<bool> {
        self.account_table_present
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(|r| r.is_admin())
    }

    /// Email of the signed-in visitor.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user().and_then(|u| u.email.as_deref())
    }

    /// Access token of the signed-in visitor, for functions and storage.
    #[must_use]
    pub fn bearer(&self) -> Option<SecretString> {
        self.session.as_ref().map(AuthSession::bearer)
    }

    /// Data client acting as this visitor, or anonymously when signed out.
    #[must_use]
    pub fn data(&self, backend: &Backend) -> DataClient {
        match &self.session {
            Some(session) => backend.data.authed(session.bearer()),
            None => backend.data.clone(),
        }
    }

    /// Apply an auth event.
    pub async fn apply(&mut self, event: AuthEvent, backend: &Backend) {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.session = Some(session);
            }
            AuthEvent::UserUpdated(user) => match &mut self.session {
                Some(session) => session.user = user,
                None => return,
            },
            AuthEvent::SignedOut => {
                *self = Self::anonymous();
                return;
            }
        }
        self.resolve_role(backend).await;
    }

    /// Re-resolve the role against the backend's current state, as every
    /// page load does. Returns whether the role or account row changed.
    pub async fn refresh_role(&mut self, backend: &Backend) -> bool {
        if self.session.is_none() {
            return false;
        }
        let before = (self.role, self.account.clone());
        self.resolve_role(backend).await;
        before != (self.role, self.account.clone())
    }

    async fn resolve_role(&mut self, backend: &Backend) {
        let Some(session) = &self.session else {
            return;
        };
        let data = backend.data.authed(session.bearer());
        let resolution = backend.roles.resolve(&session.user, &data).await;
        self.role = Some(resolution.role);
        self.account = resolution.account;
        self.account_table_present = backend.roles.known_table_state();
    }

    /// Refresh the access token if it is about to expire. A failed refresh
    /// signs the visitor out.
    ///
    /// Returns whether the context changed and needs saving.
    pub async fn ensure_fresh(&mut self, backend: &Backend) -> bool {
        self.ensure_fresh_at(backend, Utc::now().timestamp()).await
    }

    async fn ensure_fresh_at(&mut self, backend: &Backend, now: i64) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !session.expires_within(now, REFRESH_MARGIN_SECS) {
            return false;
        }

        match backend.auth.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.apply(AuthEvent::TokenRefreshed(refreshed), backend).await;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; signing out");
                self.apply(AuthEvent::SignedOut, backend).await;
            }
        }
        true
    }

    /// Revoke the session remotely (best effort) and reset to anonymous.
    pub async fn sign_out(&mut self, backend: &Backend) {
        if let Some(session) = &self.session {
            if let Err(e) = backend.auth.sign_out(&session.bearer()).await {
                warn!(error = %e, "Remote sign-out failed");
            }
            info!(user_id = %session.user.id, "Signed out");
        }
        self.apply(AuthEvent::SignedOut, backend).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RoleSource};
    use mockito::Matcher;
    use serde_json::json;

    fn backend(server: &mockito::Server, source: RoleSource) -> Backend {
        let config = BackendConfig::new(&server.url(), "anon-key", source).unwrap();
        Backend::new(&config, None)
    }

    fn session(token: &str, expires_at: i64, role: &str) -> AuthSession {
        serde_json::from_value(json!({
            "access_token": token,
            "refresh_token": "ref-1",
            "expires_at": expires_at,
            "user": {"id": "u-1", "email": "lead@patrol.org", "user_metadata": {"role": role}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_resolves_role_and_sign_out_clears() {
        let server = mockito::Server::new_async().await;
        let backend = backend(&server, RoleSource::Metadata);

        let mut ctx = AuthContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.role(), None);

        // Probe hits the mock server with no mocks: 501 counts as present.
        ctx.apply(AuthEvent::SignedIn(session("jwt", 0, "admin")), &backend)
            .await;
        assert!(ctx.is_authenticated());
        assert!(ctx.is_admin());
        assert_eq!(ctx.email(), Some("lead@patrol.org"));

        ctx.apply(AuthEvent::SignedOut, &backend).await;
        assert_eq!(ctx, AuthContext::anonymous());
    }

    #[tokio::test]
    async fn test_user_updated_re_resolves() {
        let server = mockito::Server::new_async().await;
        let backend = backend(&server, RoleSource::Metadata);

        let mut ctx = AuthContext::anonymous();
        ctx.apply(AuthEvent::SignedIn(session("jwt", 0, "admin")), &backend)
            .await;
        let demoted: AuthUser =
            serde_json::from_value(json!({"id": "u-1", "user_metadata": {"role": "user"}})).unwrap();
        ctx.apply(AuthEvent::UserUpdated(demoted), &backend).await;
        assert!(!ctx.is_admin());
        assert_eq!(ctx.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_refresh_role_picks_up_demotion() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("select".into(), "id".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let admin_row = server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u-1".into()))
            .with_status(200)
            .with_body(r#"[{"id": "u-1", "role": "admin"}]"#)
            .create_async()
            .await;
        let backend = backend(&server, RoleSource::AccountTable);

        let mut ctx = AuthContext::anonymous();
        assert!(!ctx.refresh_role(&backend).await);
        ctx.apply(AuthEvent::SignedIn(session("jwt", 0, "user")), &backend)
            .await;
        assert!(ctx.is_admin());
        assert!(!ctx.refresh_role(&backend).await);

        admin_row.remove_async().await;
        server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u-1".into()))
            .with_status(200)
            .with_body(r#"[{"id": "u-1", "role": "user"}]"#)
            .create_async()
            .await;

        assert!(ctx.refresh_role(&backend).await);
        assert!(!ctx.is_admin());
        assert_eq!(ctx.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_ensure_fresh_refreshes_near_expiry() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .match_body(Matcher::Json(json!({"refresh_token": "ref-1"})))
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "jwt-new",
                    "refresh_token": "ref-2",
                    "expires_at": 5000,
                    "user": {"id": "u-1", "user_metadata": {}}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let backend = backend(&server, RoleSource::Metadata);

        let mut ctx = AuthContext::anonymous();
        ctx.session = Some(session("jwt-old", 1030, "user"));

        assert!(!ctx.ensure_fresh_at(&backend, 900).await);
        assert!(ctx.ensure_fresh_at(&backend, 1000).await);
        assert_eq!(ctx.session().map(|s| s.refresh_token.as_str()), Some("ref-2"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#)
            .create_async()
            .await;
        let backend = backend(&server, RoleSource::Metadata);

        let mut ctx = AuthContext::anonymous();
        ctx.session = Some(session("jwt-old", 10, "admin"));
        ctx.role = Some(Role::Admin);

        assert!(ctx.ensure_fresh_at(&backend, 1000).await);
        assert!(!ctx.is_authenticated());
        assert!(!ctx.is_admin());
    }
}
