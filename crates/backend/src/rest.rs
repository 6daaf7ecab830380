//! Relational REST dialect.
//!
//! Tables are addressed as `/rest/v1/{Table}`. Filters travel as query
//! parameters (`col=eq.value`, `order=col.desc`, `limit=n`), writes ask for
//! the written rows back with `Prefer: return=representation`.

use std::fmt::Write as _;

use alpine_guardian_core::models::{Account, Order, Product, Review, SiteSettings};
use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BackendError;
use crate::http::Transport;

/// A row type stored in a hosted table.
pub trait Record: DeserializeOwned + Send + 'static {
    /// Table name as it appears in the REST path.
    const TABLE: &'static str;
}

impl Record for Product {
    const TABLE: &'static str = "Product";
}

impl Record for Order {
    const TABLE: &'static str = "Order";
}

impl Record for Review {
    const TABLE: &'static str = "Review";
}

impl Record for Account {
    const TABLE: &'static str = "Account";
}

impl Record for SiteSettings {
    const TABLE: &'static str = "SiteSettings";
}

/// Sort direction for [`Filter::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Query predicates for a table request.
///
/// ```
/// use alpine_guardian_backend::rest::{Direction, Filter};
///
/// let filter = Filter::new()
///     .eq("status", "approved")
///     .order("created_date", Direction::Desc)
///     .limit(1);
/// assert_eq!(
///     filter.to_query(),
///     vec![
///         ("select".to_string(), "*".to_string()),
///         ("status".to_string(), "eq.approved".to_string()),
///         ("order".to_string(), "created_date.desc".to_string()),
///         ("limit".to_string(), "1".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    select: Option<String>,
    eq: Vec<(String, String)>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return; defaults to `*`.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.eq.push((column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Query-string pairs for reads.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![(
            "select".to_string(),
            self.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        query.extend(self.predicates());
        if !self.order.is_empty() {
            let mut order = String::new();
            for (i, (column, direction)) in self.order.iter().enumerate() {
                if i > 0 {
                    order.push(',');
                }
                let dir = match direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                let _ = write!(order, "{column}.{dir}");
            }
            query.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        query
    }

    /// Only the row predicates, for `PATCH` and `DELETE`.
    fn predicates(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.eq
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{value}")))
    }
}

/// Typed access to the relational tables.
#[derive(Clone)]
pub struct RestClient {
    transport: Transport,
    bearer: Option<SecretString>,
}

impl RestClient {
    pub(crate) const fn new(transport: Transport) -> Self {
        Self {
            transport,
            bearer: None,
        }
    }

    /// A copy of this client that acts as the given signed-in visitor.
    #[must_use]
    pub fn with_bearer(&self, token: SecretString) -> Self {
        Self {
            transport: self.transport.clone(),
            bearer: Some(token),
        }
    }

    fn path<T: Record>() -> String {
        format!("rest/v1/{}", T::TABLE)
    }

    /// `GET` rows matching the filter.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[tracing::instrument(skip(self, filter), fields(table = T::TABLE))]
    pub async fn select<T: Record>(&self, filter: &Filter) -> Result<Vec<T>, BackendError> {
        let url = self.transport.url(&Self::path::<T>(), &filter.to_query())?;
        let request = self.transport.request(Method::GET, url, self.bearer.as_ref());
        self.transport.execute_json(request).await
    }

    /// `GET` the first row matching the filter, if any.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    pub async fn select_one<T: Record>(&self, filter: Filter) -> Result<Option<T>, BackendError> {
        Ok(self.select::<T>(&filter.limit(1)).await?.into_iter().next())
    }

    /// `POST` one row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure, or
    /// `NotFound` if the service returned no row.
    #[tracing::instrument(skip(self, row), fields(table = T::TABLE))]
    pub async fn insert<T: Record, B: Serialize + Sync>(&self, row: &B) -> Result<T, BackendError> {
        let url = self.transport.url(&Self::path::<T>(), &[])?;
        let request = self
            .transport
            .request(Method::POST, url, self.bearer.as_ref())
            .header("Prefer", "return=representation")
            .json(row);
        let rows: Vec<T> = self.transport.execute_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("{} insert returned no row", T::TABLE)))
    }

    /// `PATCH` rows matching the filter and return them.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport, status or parse failure.
    #[tracing::instrument(skip(self, filter, patch), fields(table = T::TABLE))]
    pub async fn update<T: Record, B: Serialize + Sync>(
        &self,
        filter: &Filter,
        patch: &B,
    ) -> Result<Vec<T>, BackendError> {
        let query: Vec<_> = filter.predicates().collect();
        let url = self.transport.url(&Self::path::<T>(), &query)?;
        let request = self
            .transport
            .request(Method::PATCH, url, self.bearer.as_ref())
            .header("Prefer", "return=representation")
            .json(patch);
        self.transport.execute_json(request).await
    }

    /// `DELETE` rows matching the filter.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` on transport or status failure.
    #[tracing::instrument(skip(self, filter), fields(table = T::TABLE))]
    pub async fn delete<T: Record>(&self, filter: &Filter) -> Result<(), BackendError> {
        let query: Vec<_> = filter.predicates().collect();
        let url = self.transport.url(&Self::path::<T>(), &query)?;
        let request = self.transport.request(Method::DELETE, url, self.bearer.as_ref());
        self.transport.execute(request).await?;
        Ok(())
    }

    /// Cheapest possible read, used to detect whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns the raw `BackendError`; callers classify it with
    /// [`BackendError::is_missing_table`].
    pub async fn probe<T: Record>(&self) -> Result<(), BackendError> {
        let url = self
            .transport
            .url(&Self::path::<T>(), &Filter::new().select("id").limit(1).to_query())?;
        let request = self.transport.request(Method::GET, url, self.bearer.as_ref());
        self.transport.execute(request).await?;
        Ok(())
    }
}
