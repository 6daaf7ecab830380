//! Application state shared across handlers.

use std::sync::Arc;

use alpine_guardian_backend::Backend;
use sqlx::PgPool;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    backend: Backend,
}

impl AppState {
    /// Create a new application state. Admin reads always hit the tables, so
    /// the backend is built without a read cache.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let backend = Backend::new(&config.backend, None);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                backend,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Session store pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }
}
