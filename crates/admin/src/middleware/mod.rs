//! HTTP middleware stack for admin.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! [`RequireAdmin`] runs inside the session layer on every panel route.

pub mod auth;
pub mod session;

pub use auth::{AdminAuthRejection, OptionalAdmin, RequireAdmin};
pub use session::{create_session_layer, session_layer_with_store};
