//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! The [`Viewer`] and [`RequireUser`] extractors run inside the session
//! layer and hydrate the visitor's auth context.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{AuthRejection, RequireUser, Viewer};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, session_layer_with_store};
