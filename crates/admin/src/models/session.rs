//! Session-stored admin state.

use alpine_guardian_backend::AuthContext;
use tower_sessions::Session;

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for the signed-in admin's auth context.
    pub const AUTH_CONTEXT: &str = "admin_auth_context";
}

/// Load the auth context, anonymous if none is stored.
pub async fn load_auth(session: &Session) -> AuthContext {
    match session.get::<AuthContext>(keys::AUTH_CONTEXT).await {
        Ok(ctx) => ctx.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read auth context from session");
            AuthContext::anonymous()
        }
    }
}

/// Persist the auth context; signing out removes it.
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
