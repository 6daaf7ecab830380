//! Role resolution.
//!
//! Roles come either from the auth user's metadata or from the optional
//! `Account` side table. The side table may not exist in a given deployment;
//! its presence is probed once per process and remembered, and once the
//! backend reports it undefined it is never queried again. Transient
//! failures only affect the lookup they happen in. Every failure resolves to
//! [`Role::User`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use alpine_guardian_core::models::Account;
use alpine_guardian_core::{Role, RoleLookup};
use tracing::{debug, warn};

use crate::auth::AuthUser;
use crate::config::RoleSource;
use crate::data::DataClient;

const TABLE_UNKNOWN: u8 = 0;
const TABLE_PRESENT: u8 = 1;
const TABLE_MISSING: u8 = 2;

/// Role and account row for one signed-in visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub role: Role,
    pub account: Option<Account>,
}

/// Resolves visitor roles and remembers whether the side table exists.
///
/// Clones share the presence memo.
#[derive(Clone)]
pub struct RoleResolver {
    source: RoleSource,
    data: DataClient,
    table_state: Arc<AtomicU8>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(source: RoleSource, data: DataClient) -> Self {
        Self {
            source,
            data,
            table_state: Arc::new(AtomicU8::new(TABLE_UNKNOWN)),
        }
    }

    #[must_use]
    pub const fn source(&self) -> RoleSource {
        self.source
    }

    /// Memoized presence, without probing. `None` until the first probe.
    #[must_use]
    pub fn known_table_state(&self) -> Option<bool> {
        match self.table_state.load(Ordering::Acquire) {
            TABLE_PRESENT => Some(true),
            TABLE_MISSING => Some(false),
            _ => None,
        }
    }

    fn mark_missing(&self) {
        self.table_state.store(TABLE_MISSING, Ordering::Release);
    }

    /// Whether the `Account` table exists, probing on first use.
    pub async fn account_table_present(&self) -> bool {
        if let Some(known) = self.known_table_state() {
            return known;
        }

        match self.data.rest().probe::<Account>().await {
            Ok(()) => {
                self.table_state.store(TABLE_PRESENT, Ordering::Release);
                true
            }
            Err(e) if e.is_undefined_table() => {
                warn!(
                    error = %e,
                    "Account table does not exist; roles default to user. Run `ag-cli migrate account` to enable admin roles."
                );
                self.mark_missing();
                false
            }
            Err(e) if e.is_missing_table() => {
                warn!(error = %e, "Account table unreachable; treating as missing for this lookup");
                false
            }
            Err(e) => {
                debug!(error = %e, "Account probe failed; assuming the table exists");
                self.table_state.store(TABLE_PRESENT, Ordering::Release);
                true
            }
        }
    }

    /// Look up the visitor's account row, classifying the outcome.
    ///
    /// `data` should act as the visitor so row-level policies apply.
    async fn lookup(&self, user: &AuthUser, data: &DataClient) -> (RoleLookup, Option<Account>) {
        if !self.account_table_present().await {
            return (RoleLookup::TableMissing, None);
        }

        match data.get_account(&user.id).await {
            Ok(Some(account)) => (RoleLookup::Row(account.role.clone()), Some(account)),
            Ok(None) => (RoleLookup::NoRow, None),
            Err(e) if e.is_undefined_table() => {
                self.mark_missing();
                (RoleLookup::TableMissing, None)
            }
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "Account lookup failed; defaulting to user");
                (RoleLookup::Failed, None)
            }
        }
    }

    /// Resolve the visitor's role and account row.
    pub async fn resolve(&self, user: &AuthUser, data: &DataClient) -> Resolution {
        let (lookup, account) = self.lookup(user, data).await;
        let role = match self.source {
            RoleSource::Metadata => Role::from_stored(user.metadata_role()),
            RoleSource::AccountTable => lookup.resolve(),
        };
        debug!(user_id = %user.id, %role, source = %self.source, "Resolved role");
        Resolution { role, account }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Backend;
    use crate::config::BackendConfig;
    use mockito::Matcher;
    use serde_json::json;

    fn backend(server: &mockito::Server, source: RoleSource) -> Backend {
        let config = BackendConfig::new(&server.url(), "anon-key", source).unwrap();
        Backend::new(&config, None)
    }

    fn user(metadata_role: Option<&str>) -> AuthUser {
        let metadata = metadata_role.map_or_else(|| json!({}), |r| json!({"role": r}));
        serde_json::from_value(json!({"id": "u-1", "email": "a@b.co", "user_metadata": metadata}))
            .unwrap()
    }

    async fn probe_mock(server: &mut mockito::Server, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "id".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    async fn row_mock(server: &mut mockito::Server, body: &str) -> mockito::Mock {
        server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("id".into(), "eq.u-1".into()),
            ]))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_admin_row_resolves_admin() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 200, "[]").await;
        row_mock(&mut server, r#"[{"id": "u-1", "role": "admin"}]"#).await;

        let backend = backend(&server, RoleSource::AccountTable);
        let resolution = backend.roles.resolve(&user(None), &backend.data).await;
        assert_eq!(resolution.role, Role::Admin);
        assert!(resolution.account.is_some());
    }

    #[tokio::test]
    async fn test_no_row_resolves_user() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 200, "[]").await;
        row_mock(&mut server, "[]").await;

        let backend = backend(&server, RoleSource::AccountTable);
        let resolution = backend.roles.resolve(&user(Some("admin")), &backend.data).await;
        assert_eq!(resolution.role, Role::User);
        assert!(resolution.account.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_is_memoized() {
        let mut server = mockito::Server::new_async().await;
        let probe = server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("select".into(), "id".into()))
            .with_status(404)
            .with_body(
                r#"{"code":"PGRST205","message":"Could not find the table 'public.Account' in the schema cache"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let backend = backend(&server, RoleSource::AccountTable);
        for _ in 0..3 {
            let resolution = backend.roles.resolve(&user(None), &backend.data).await;
            assert_eq!(resolution.role, Role::User);
        }
        assert_eq!(backend.roles.known_table_state(), Some(false));
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_row_lookup_does_not_disable_roles() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 200, "[]").await;
        let failing = server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u-1".into()))
            .with_status(500)
            .with_body(r#"{"message":"upstream request timeout"}"#)
            .create_async()
            .await;

        let backend = backend(&server, RoleSource::AccountTable);
        let first = backend.roles.resolve(&user(None), &backend.data).await;
        assert_eq!(first.role, Role::User);
        assert_eq!(backend.roles.known_table_state(), Some(true));

        failing.remove_async().await;
        row_mock(&mut server, r#"[{"id": "u-1", "role": "admin"}]"#).await;

        let second = backend.roles.resolve(&user(None), &backend.data).await;
        assert_eq!(second.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_unreachable_probe_is_not_memoized() {
        let mut server = mockito::Server::new_async().await;
        let probe = probe_mock(&mut server, 500, "Internal Server Error").await;

        let backend = backend(&server, RoleSource::AccountTable);
        assert!(!backend.roles.account_table_present().await);
        assert_eq!(backend.roles.known_table_state(), None);

        probe.remove_async().await;
        probe_mock(&mut server, 200, "[]").await;
        assert!(backend.roles.account_table_present().await);
        assert_eq!(backend.roles.known_table_state(), Some(true));
    }

    #[tokio::test]
    async fn test_other_probe_errors_count_as_present() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 401, r#"{"message":"JWT expired"}"#).await;

        let backend = backend(&server, RoleSource::AccountTable);
        assert!(backend.roles.account_table_present().await);
        assert_eq!(backend.roles.known_table_state(), Some(true));
    }

    #[tokio::test]
    async fn test_lookup_error_defaults_to_user() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 200, "[]").await;
        server
            .mock("GET", "/rest/v1/Account")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u-1".into()))
            .with_status(403)
            .with_body(r#"{"code":"42501","message":"permission denied"}"#)
            .create_async()
            .await;

        let backend = backend(&server, RoleSource::AccountTable);
        let resolution = backend.roles.resolve(&user(None), &backend.data).await;
        assert_eq!(resolution.role, Role::User);
        assert!(!resolution.role.is_admin());
    }

    #[tokio::test]
    async fn test_metadata_source_reads_user_metadata() {
        let mut server = mockito::Server::new_async().await;
        probe_mock(&mut server, 404, r#"{"code":"42P01","message":"relation does not exist"}"#).await;

        let backend = backend(&server, RoleSource::Metadata);
        let admin = backend.roles.resolve(&user(Some("admin")), &backend.data).await;
        let plain = backend.roles.resolve(&user(Some("editor")), &backend.data).await;
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(plain.role, Role::User);
    }
}
