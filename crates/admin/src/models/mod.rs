//! Admin session models.

pub mod session;

pub use session::{keys as session_keys, load_auth, save_auth};
