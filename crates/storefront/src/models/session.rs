//! Session-stored visitor state.
//!
//! The browsing session holds two values: the visitor's [`AuthContext`] and
//! their [`Cart`]. Both are written back whole after every change.

use alpine_guardian_backend::AuthContext;
use alpine_guardian_core::cart::Cart;
use tower_sessions::Session;

/// Session keys.
pub mod keys {
    /// Key for the visitor's auth context.
    pub const AUTH_CONTEXT: &str = "auth_context";

    /// Key for the shopping cart.
    pub const CART: &str = "cart";
}

/// Load the cart, or an empty one if none is stored or it cannot be read.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart from session");
            Cart::new()
        }
    }
}

/// Persist the whole cart.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// Load the visitor's auth context, anonymous if none is stored.
pub async fn load_auth(session: &Session) -> AuthContext {
    match session.get::<AuthContext>(keys::AUTH_CONTEXT).await {
        Ok(ctx) => ctx.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read auth context from session");
            AuthContext::anonymous()
        }
    }
}

/// Persist the auth context. Anonymous contexts are removed rather than
/// stored.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_auth(
    session: &Session,
    ctx: &AuthContext,
) -> Result<(), tower_sessions::session::Error> {
    if ctx.is_authenticated() {
        session.insert(keys::AUTH_CONTEXT, ctx).await
    } else {
        session.remove::<AuthContext>(keys::AUTH_CONTEXT).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use alpine_guardian_core::models::{Product, Selections};
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_missing_cart_is_empty() {
        let session = session();
        assert!(load_cart(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_cart_round_trips_through_session() {
        let session = session();
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "p1", "name": "Radio Beacon", "price": 10.0
        }))
        .unwrap();
        let mut cart = Cart::new();
        cart.add(&product, &Selections::new(), 2);

        save_cart(&session, &cart).await.unwrap();
        let loaded = load_cart(&session).await;
        assert_eq!(loaded, cart);
        assert_eq!(loaded.item_count(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_auth_is_not_stored() {
        let session = session();
        save_auth(&session, &AuthContext::anonymous()).await.unwrap();
        assert!(
            session
                .get::<AuthContext>(keys::AUTH_CONTEXT)
                .await
                .unwrap()
                .is_none()
        );
        assert!(!load_auth(&session).await.is_authenticated());
    }
}
