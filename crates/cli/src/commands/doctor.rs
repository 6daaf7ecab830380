//! Backend health check.
//!
//! Probes every table the storefront and admin read, then reports how roles
//! will be resolved. The `Account` table is optional; the others are not.

use alpine_guardian_backend::rest::Record;
use alpine_guardian_backend::{Backend, BackendConfig, BackendError, ConfigError, RoleSource};
use alpine_guardian_core::models::{Account, Order, Product, Review, SiteSettings};

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} required table(s) unavailable")]
    Unhealthy(usize),
}

/// Outcome of probing one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Present,
    Missing,
    Error(String),
}

impl TableStatus {
    fn from_probe(result: Result<(), BackendError>) -> Self {
        match result {
            Ok(()) => Self::Present,
            Err(e) if e.is_missing_table() => Self::Missing,
            Err(e) => Self::Error(e.to_string()),
        }
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Present => "ok",
            Self::Missing => "missing",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableCheck {
    pub table: &'static str,
    pub required: bool,
    pub status: TableStatus,
}

async fn probe<T: Record>(backend: &Backend, required: bool) -> TableCheck {
    TableCheck {
        table: T::TABLE,
        required,
        status: TableStatus::from_probe(backend.data.rest().probe::<T>().await),
    }
}

/// Probe all five tables concurrently.
pub async fn check_tables(backend: &Backend) -> Vec<TableCheck> {
    let (products, orders, reviews, settings, accounts) = tokio::join!(
        probe::<Product>(backend, true),
        probe::<Order>(backend, true),
        probe::<Review>(backend, true),
        probe::<SiteSettings>(backend, true),
        probe::<Account>(backend, false),
    );
    vec![products, orders, reviews, settings, accounts]
}

/// Describe how roles will be resolved given the `Account` table's state.
#[must_use]
pub fn role_summary(source: RoleSource, account_present: bool) -> &'static str {
    match (source, account_present) {
        (RoleSource::Metadata, _) => "roles read from user metadata",
        (RoleSource::AccountTable, true) => "roles read from the Account table",
        (RoleSource::AccountTable, false) => {
            "Account table missing: every visitor resolves to 'user' (run `ag-cli migrate account`)"
        }
    }
}

/// Run the health check against the configured project.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or a required table is
/// unavailable.
pub async fn run() -> Result<(), DoctorError> {
    let config = BackendConfig::from_env()?;
    let backend = Backend::new(&config, None);

    tracing::info!(backend = %config.url, role_source = %config.role_source, "Probing backend");
    let checks = check_tables(&backend).await;
    let account_present = backend.roles.account_table_present().await;

    #[allow(clippy::print_stdout)]
    {
        println!("Backend: {}", config.base());
        for check in &checks {
            let optional = if check.required { "" } else { " (optional)" };
            match &check.status {
                TableStatus::Error(message) => {
                    println!("  {:<14} {}{optional}: {message}", check.table, check.status.label());
                }
                status => println!("  {:<14} {}{optional}", check.table, status.label()),
            }
        }
        println!("Roles: {}", role_summary(config.role_source, account_present));
    }

    let failed = checks
        .iter()
        .filter(|c| c.required && c.status != TableStatus::Present)
        .count();
    if failed > 0 {
        return Err(DoctorError::Unhealthy(failed));
    }
    Ok(())
}
