//! Hosted auth service client.
//!
//! Password sign-in and sign-up, password recovery, token refresh and
//! profile updates against `/auth/v1`.

use std::fmt;

use alpine_guardian_core::UserId;
use chrono::Utc;
use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::instrument;

use crate::error::BackendError;
use crate::http::Transport;

/// A user record from the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// `user_metadata.full_name`, if set.
    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.metadata_str("full_name")
    }

    /// `user_metadata.role`, if set.
    #[must_use]
    pub fn metadata_role(&self) -> Option<&str> {
        self.metadata_str("role")
    }

    /// Name to greet the visitor with: full name, else the email's local part.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name() {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or("Patroller")
            .to_string()
    }

    #[must_use]
    pub const fn email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Tokens plus the signed-in user.
///
/// Stored in the browsing session, so the tokens are plain strings;
/// `Debug` redacts them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as a Unix timestamp in seconds.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl AuthSession {
    /// Access token for bearer use.
    #[must_use]
    pub fn bearer(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    /// Whether the access token expires within `margin_secs` of `now`.
    #[must_use]
    pub const fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at - now <= margin_secs
    }
}

/// Raw token grant response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl From<TokenResponse> for AuthSession {
    fn from(t: TokenResponse) -> Self {
        let expires_at = t
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + t.expires_in.unwrap_or(3600));
        Self {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_at,
            user: t.user,
        }
    }
}

/// Result of a sign-up.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Email confirmation is off; the visitor is signed in.
    SignedIn(Box<AuthSession>),
    /// A confirmation email was sent.
    ConfirmationRequired(AuthUser),
}

/// Profile changes accepted by `PUT /auth/v1/user`.
#[derive(Debug, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Client for `/auth/v1`.
#[derive(Clone)]
pub struct AuthClient {
    transport: Transport,
}

impl AuthClient {
    pub(crate) const fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn grant(&self, grant_type: &str, body: Value) -> Result<AuthSession, BackendError> {
        let url = self.transport.url(
            "auth/v1/token",
            &[("grant_type".to_string(), grant_type.to_string())],
        )?;
        let request = self.transport.request(Method::POST, url, None).json(&body);
        let token: TokenResponse = self.transport.execute_json(request).await?;
        Ok(token.into())
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` with the service's message on bad
    /// credentials or an unconfirmed email.
    #[instrument(skip(self, email, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        self.grant("password", json!({ "email": email, "password": password }))
            .await
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the refresh token is revoked or expired.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        self.grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Register a new account with `full_name` in the user metadata.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the service rejects the sign-up.
    #[instrument(skip(self, email, password, full_name))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, BackendError> {
        let query: Vec<(String, String)> = redirect_to
            .map(|r| vec![("redirect_to".to_string(), r.to_string())])
            .unwrap_or_default();
        let url = self.transport.url("auth/v1/signup", &query)?;
        let request = self.transport.request(Method::POST, url, None).json(&json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        }));
        let body: Value = self.transport.execute_json(request).await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return Ok(SignUpOutcome::SignedIn(Box::new(token.into())));
        }

        let user = match body.get("user") {
            Some(user) => serde_json::from_value(user.clone())?,
            None => serde_json::from_value(body)?,
        };
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// Send a password reset email whose link lands on `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, email))]
    pub async fn recover(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let url = self.transport.url(
            "auth/v1/recover",
            &[("redirect_to".to_string(), redirect_to.to_string())],
        )?;
        let request = self
            .transport
            .request(Method::POST, url, None)
            .json(&json!({ "email": email }));
        self.transport.execute(request).await?;
        Ok(())
    }

    /// Exchange a recovery token hash from the reset email for a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the link is invalid or expired.
    #[instrument(skip_all)]
    pub async fn verify_recovery(&self, token_hash: &str) -> Result<AuthSession, BackendError> {
        let url = self.transport.url("auth/v1/verify", &[])?;
        let request = self
            .transport
            .request(Method::POST, url, None)
            .json(&json!({ "type": "recovery", "token_hash": token_hash }));
        let token: TokenResponse = self.transport.execute_json(request).await?;
        Ok(token.into())
    }

    /// Fetch the user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the token is invalid.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, BackendError> {
        let url = self.transport.url("auth/v1/user", &[])?;
        let request = self.transport.request(Method::GET, url, Some(access_token));
        self.transport.execute_json(request).await
    }

    /// Update the signed-in user's email, password or metadata.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the service rejects the change.
    #[instrument(skip_all)]
    pub async fn update_user(
        &self,
        access_token: &SecretString,
        update: &UserUpdate,
    ) -> Result<AuthUser, BackendError> {
        let url = self.transport.url("auth/v1/user", &[])?;
        let request = self
            .transport
            .request(Method::PUT, url, Some(access_token))
            .json(update);
        self.transport.execute_json(request).await
    }

    /// Revoke the session server-side.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &SecretString) -> Result<(), BackendError> {
        let url = self.transport.url("auth/v1/logout", &[])?;
        let request = self.transport.request(Method::POST, url, Some(access_token));
        self.transport.execute(request).await?;
        Ok(())
    }
}
