//! Database migration commands.
//!
//! # Targets
//!
//! - `sessions` - Session tables for the storefront and admin servers
//!   (`tower_sessions.session`), created by the session store itself
//! - `account` - The optional `Account` side table, its row policies and
//!   the sign-up trigger, applied to the hosted project's database
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - Storefront session database
//! - `ADMIN_DATABASE_URL` - Admin session database
//! - `BACKEND_DATABASE_URL` - Direct connection to the hosted project's database
//!
//! Each falls back to `DATABASE_URL`.
//!
//! # Migration Files
//!
//! Account migrations live in `crates/cli/migrations/`.

use alpine_guardian_backend::config::{ConfigError, get_database_url};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

async fn connect(key: &str) -> Result<PgPool, MigrationError> {
    let database_url = get_database_url(key)?;
    tracing::info!("Connecting to {key}...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}

/// Create the session tables for both servers.
///
/// When both variables resolve to the same database it is migrated once.
///
/// # Errors
///
/// Returns an error if a URL is missing or the store migration fails.
pub async fn sessions() -> Result<(), MigrationError> {
    let storefront_url = get_database_url("STOREFRONT_DATABASE_URL")?;
    let admin_url = get_database_url("ADMIN_DATABASE_URL")?;

    migrate_session_store("STOREFRONT_DATABASE_URL").await?;
    if !same_database(&storefront_url, &admin_url) {
        migrate_session_store("ADMIN_DATABASE_URL").await?;
    }

    tracing::info!("Session migrations complete!");
    Ok(())
}

async fn migrate_session_store(key: &str) -> Result<(), MigrationError> {
    let pool = connect(key).await?;
    tracing::info!("Creating session tables...");
    PostgresStore::new(pool).migrate().await?;
    Ok(())
}

fn same_database(a: &SecretString, b: &SecretString) -> bool {
    a.expose_secret() == b.expose_secret()
}

/// Apply the `Account` side-table migrations to the hosted project.
///
/// # Errors
///
/// Returns an error if the URL is missing or a migration fails.
pub async fn account() -> Result<(), MigrationError> {
    let pool = connect("BACKEND_DATABASE_URL").await?;

    tracing::info!("Running account migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Account migrations complete!");
    Ok(())
}
