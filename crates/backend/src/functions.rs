//! Serverless function calls.
//!
//! Functions answer `200` with either a result object or `{error}`, and
//! sometimes a non-success status with the same `{error}` body. Both shapes
//! surface as [`BackendError::Function`] carrying the message verbatim.

use alpine_guardian_core::checkout::LineItem;
use alpine_guardian_core::{Role, UserId};
use reqwest::Method;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::error::BackendError;
use crate::http::Transport;

/// Request body for `create-checkout-session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest<'a> {
    pub items: &'a [LineItem],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<&'a str>,
}

/// A created payment session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    /// Hosted page URL, when the function returns one.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleChange<'a> {
    user_id: &'a UserId,
    new_role: Role,
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AuthUser>,
}

/// Client for `/functions/v1`.
#[derive(Clone)]
pub struct FunctionsClient {
    transport: Transport,
}

impl FunctionsClient {
    pub(crate) const fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn invoke<B, T>(
        &self,
        name: &str,
        body: &B,
        bearer: Option<&SecretString>,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.transport.url(&format!("functions/v1/{name}"), &[])?;
        let request = self.transport.request(Method::POST, url, bearer).json(body);

        let value: Value = match self.transport.execute_json(request).await {
            Ok(value) => value,
            Err(BackendError::Api { message, .. }) => return Err(BackendError::Function(message)),
            Err(e) => return Err(e),
        };

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map_or_else(|| error.to_string(), str::to_string);
            return Err(BackendError::Function(message));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Create a hosted payment session for the given line items.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Function` with the function's message, or a
    /// transport error. Never retried.
    #[instrument(skip(self, items, customer_email, bearer), fields(items = items.len()))]
    pub async fn create_checkout_session(
        &self,
        items: &[LineItem],
        customer_email: Option<&str>,
        bearer: Option<&SecretString>,
    ) -> Result<CheckoutSession, BackendError> {
        self.invoke(
            "create-checkout-session",
            &CheckoutRequest {
                items,
                customer_email,
            },
            bearer,
        )
        .await
    }

    /// Change a user's role. The caller's token must belong to an admin.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Function` if the function refuses.
    #[instrument(skip_all, fields(user_id = %user_id, role = %new_role))]
    pub async fn update_user_role(
        &self,
        user_id: &UserId,
        new_role: Role,
        bearer: &SecretString,
    ) -> Result<(), BackendError> {
        let _: Value = self
            .invoke(
                "update-user-role",
                &RoleChange { user_id, new_role },
                Some(bearer),
            )
            .await?;
        Ok(())
    }

    /// Every user in the auth directory.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Function` if the function refuses.
    #[instrument(skip_all)]
    pub async fn list_users(&self, bearer: &SecretString) -> Result<Vec<AuthUser>, BackendError> {
        let list: UserList = self
            .invoke("list-users", &serde_json::json!({}), Some(bearer))
            .await?;
        Ok(list.users)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RoleSource};
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::Server) -> FunctionsClient {
        let config = BackendConfig::new(&server.url(), "anon-key", RoleSource::Metadata).unwrap();
        FunctionsClient::new(Transport::new(&config))
    }

    fn items() -> Vec<LineItem> {
        vec![LineItem {
            price_id: "price_123".into(),
            quantity: 2,
            is_subscription: false,
        }]
    }

    #[tokio::test]
    async fn test_create_checkout_session_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/functions/v1/create-checkout-session")
            .match_body(Matcher::Json(json!({
                "items": [{"priceId": "price_123", "quantity": 2, "isSubscription": false}],
                "customerEmail": "sam@resort.com"
            })))
            .with_status(200)
            .with_body(r#"{"sessionId": "cs_test_1"}"#)
            .create_async()
            .await;

        let session = client(&server)
            .create_checkout_session(&items(), Some("sam@resort.com"), None)
            .await
            .unwrap();
        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(session.url, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_checkout_without_email_omits_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/functions/v1/create-checkout-session")
            .match_body(Matcher::Json(json!({
                "items": [{"priceId": "price_123", "quantity": 2, "isSubscription": false}]
            })))
            .with_status(200)
            .with_body(r#"{"sessionId": "cs_test_2", "url": "https://pay.test/cs_test_2"}"#)
            .create_async()
            .await;

        let session = client(&server)
            .create_checkout_session(&items(), None, None)
            .await
            .unwrap();
        assert_eq!(session.url.as_deref(), Some("https://pay.test/cs_test_2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_function_error_is_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/create-checkout-session")
            .with_status(400)
            .with_body(r#"{"error": "No such price: 'price_123'"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .create_checkout_session(&items(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Function(_)));
        assert_eq!(err.to_string(), "No such price: 'price_123'");
    }

    #[tokio::test]
    async fn test_update_user_role_sends_admin_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/functions/v1/update-user-role")
            .match_header("authorization", "Bearer admin-jwt")
            .match_body(Matcher::Json(json!({"userId": "u-9", "newRole": "admin"})))
            .with_status(200)
            .with_body(r#"{"success": true, "user": {"id": "u-9"}}"#)
            .create_async()
            .await;

        client(&server)
            .update_user_role(
                &UserId::new("u-9"),
                Role::Admin,
                &SecretString::from("admin-jwt"),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_user_role_refused() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/update-user-role")
            .with_status(200)
            .with_body(r#"{"error": "Unauthorized: Admin access required"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .update_user_role(&UserId::new("u-9"), Role::User, &SecretString::from("jwt"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized: Admin access required");
    }

    #[tokio::test]
    async fn test_list_users() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/list-users")
            .with_status(200)
            .with_body(r#"{"users": [{"id": "u-1", "email": "a@patrol.org"}, {"id": "u-2"}]}"#)
            .create_async()
            .await;

        let users = client(&server)
            .list_users(&SecretString::from("jwt"))
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
    }
}
