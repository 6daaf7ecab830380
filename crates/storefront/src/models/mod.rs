//! Storefront-side models: session-held state.

pub mod session;

pub use session::{keys as session_keys, load_auth, load_cart, save_auth, save_cart};
