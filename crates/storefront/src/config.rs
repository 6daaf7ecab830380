//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session
//!   store (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront, used in email links
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY` - Hosted backend (see the backend crate)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `ROLE_SOURCE` - `metadata` or `account_table` (default: `account_table`)
//! - `STRIPE_PUBLISHABLE_KEY` - Payment provider publishable key; checkout is
//!   refused without it
//! - `ADMIN_URL` - Admin binary URL (default: `http://127.0.0.1:3001`)
//! - `CATALOG_CACHE_SECONDS` - Read cache TTL for products, reviews and
//!   settings (default: 60, 0 disables)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use alpine_guardian_backend::BackendConfig;
use alpine_guardian_backend::config::{
    ConfigError, get_database_url, get_env_or_default, get_optional_env, get_required_env,
    parse_env_or,
};
use secrecy::SecretString;

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Hosted backend connection
    pub backend: BackendConfig,
    /// Payment provider publishable key (safe to expose in browser)
    pub stripe_publishable_key: Option<String>,
    /// Where the admin dashboard lives
    pub admin_url: String,
    /// Catalog read cache TTL; zero disables the cache
    pub catalog_cache: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("backend", &self.backend)
            .field("stripe_publishable_key", &self.stripe_publishable_key)
            .field("admin_url", &self.admin_url)
            .field("catalog_cache", &self.catalog_cache)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[SET]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the backend key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_env_or("STOREFRONT_PORT", 3000_u16)?;
        let base_url = normalize_base_url(&get_required_env("STOREFRONT_BASE_URL")?);
        let backend = BackendConfig::from_env()?;
        let admin_url = normalize_base_url(&get_env_or_default(
            "ADMIN_URL",
            "http://127.0.0.1:3001",
        ));
        let cache_seconds = parse_env_or("CATALOG_CACHE_SECONDS", 60_u64)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            backend,
            stripe_publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
            admin_url,
            catalog_cache: Duration::from_secs(cache_seconds),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_env_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL of a storefront path, for links that leave the site
    /// (confirmation and reset emails, payment return pages).
    #[must_use]
    pub fn absolute(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
