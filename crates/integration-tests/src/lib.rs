//! End-to-end test harness for Alpine Guardian.
//!
//! Each test starts the real storefront or admin router on an ephemeral
//! port, pointed at a `mockito` server standing in for the hosted backend.
//! Sessions use the in-memory store and the session pool connects lazily,
//! so no database is needed.
//!
//! ```bash
//! cargo test -p alpine-guardian-integration-tests
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use alpine_guardian_admin::config::AdminConfig;
use alpine_guardian_backend::{BackendConfig, RoleSource};
use alpine_guardian_storefront::config::StorefrontConfig;
use axum::Router;
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::MemoryStore;

/// A server running in the background of the current test.
pub struct TestServer {
    pub base_url: String,
}

impl TestServer {
    /// Absolute URL for a path on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Pool that never connects unless a handler actually queries it.
///
/// # Panics
///
/// Panics if the URL does not parse.
#[must_use]
#[allow(clippy::expect_used)]
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgres://localhost/ag_integration_unused")
        .expect("lazy pool")
}

#[allow(clippy::expect_used)]
fn backend_config(backend_url: &str, role_source: RoleSource) -> BackendConfig {
    BackendConfig::new(backend_url, "anon-key", role_source).expect("backend config")
}

/// Storefront configuration against a mock backend.
#[must_use]
pub fn storefront_config(backend_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/ag_integration_unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://shop.test".to_string(),
        backend: backend_config(backend_url, RoleSource::AccountTable),
        stripe_publishable_key: Some("pk_test_integration".to_string()),
        admin_url: "http://admin.test".to_string(),
        catalog_cache: Duration::ZERO,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Admin configuration against a mock backend.
#[must_use]
pub fn admin_config(backend_url: &str, role_source: RoleSource) -> AdminConfig {
    AdminConfig {
        database_url: SecretString::from("postgres://localhost/ag_integration_unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://admin.test".to_string(),
        backend: backend_config(backend_url, role_source),
        storefront_url: "http://shop.test".to_string(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Start the storefront with the given configuration.
pub async fn spawn_storefront(config: StorefrontConfig) -> TestServer {
    use alpine_guardian_storefront::middleware::session_layer_with_store;
    use alpine_guardian_storefront::state::AppState;

    let session_layer = session_layer_with_store(MemoryStore::default(), &config);
    let state = AppState::new(config, lazy_pool());
    serve(alpine_guardian_storefront::build_router(state, session_layer)).await
}

/// Start the admin panel with the given configuration.
pub async fn spawn_admin(config: AdminConfig) -> TestServer {
    use alpine_guardian_admin::middleware::session_layer_with_store;
    use alpine_guardian_admin::state::AppState;

    let session_layer = session_layer_with_store(MemoryStore::default(), &config);
    let state = AppState::new(config, lazy_pool());
    serve(alpine_guardian_admin::build_router(state, session_layer)).await
}

#[allow(clippy::expect_used)]
async fn serve(app: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    TestServer {
        base_url: format!("http://{addr}"),
    }
}

/// Browser-like client: keeps cookies, does not follow redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}
