//! Data access facade over the hosted tables.
//!
//! One method per operation the pages and panels need. Every call is a single
//! round-trip; nothing is retried. When built with a TTL, the product list,
//! approved reviews and site settings are served from a `moka` cache that this
//! client's own writes invalidate.

mod cache;

use std::time::Duration;

use alpine_guardian_core::models::{
    Account, AccountProfilePatch, AccountRolePatch, NewOrder, NewReview, Order, OrderStatusPatch,
    Product, ProductInput, Review, ReviewStatusPatch, SiteSettings, SiteSettingsInput,
};
use alpine_guardian_core::{OrderId, OrderStatus, ProductId, ReviewId, ReviewStatus, Role, UserId};
use moka::future::Cache;
use secrecy::SecretString;
use tracing::{debug, instrument};

use crate::error::BackendError;
use crate::http::Transport;
use crate::rest::{Direction, Filter, RestClient};

pub use cache::{CacheKey, CacheValue};

/// Client for the `Product`, `Order`, `Review`, `Account` and `SiteSettings`
/// tables.
#[derive(Clone)]
pub struct DataClient {
    rest: RestClient,
    cache: Option<Cache<CacheKey, CacheValue>>,
}

fn newest_first() -> Filter {
    Filter::new().order("created_date", Direction::Desc)
}

impl DataClient {
    pub(crate) fn new(transport: Transport, cache_ttl: Option<Duration>) -> Self {
        let cache = cache_ttl.filter(|ttl| !ttl.is_zero()).map(|ttl| {
            Cache::builder()
                .max_capacity(16)
                .time_to_live(ttl)
                .build()
        });

        Self {
            rest: RestClient::new(transport),
            cache,
        }
    }

    /// A copy acting as the signed-in visitor, sharing the read cache.
    #[must_use]
    pub fn authed(&self, access_token: SecretString) -> Self {
        Self {
            rest: self.rest.with_bearer(access_token),
            cache: self.cache.clone(),
        }
    }

    /// The underlying table client, for probes and one-off queries.
    #[must_use]
    pub const fn rest(&self) -> &RestClient {
        &self.rest
    }

    async fn cached(&self, key: CacheKey) -> Option<CacheValue> {
        let value = self.cache.as_ref()?.get(&key).await;
        if value.is_some() {
            debug!(?key, "Cache hit");
        }
        value
    }

    async fn store(&self, key: CacheKey, value: CacheValue) {
        if let Some(cache) = &self.cache {
            cache.insert(key, value).await;
        }
    }

    async fn invalidate(&self, key: CacheKey) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&key).await;
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        if let Some(CacheValue::Products(products)) = self.cached(CacheKey::Products).await {
            return Ok(products);
        }

        let products: Vec<Product> = self.rest.select(&newest_first()).await?;
        self.store(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        if let Some(CacheValue::Products(products)) = self.cached(CacheKey::Products).await {
            return Ok(products.into_iter().find(|p| &p.id == id));
        }
        self.rest.select_one(Filter::new().eq("id", id)).await
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, BackendError> {
        let product = self.rest.insert::<Product, _>(input).await?;
        self.invalidate(CacheKey::Products).await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no row has this id.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        input: &ProductInput,
    ) -> Result<Product, BackendError> {
        let rows = self
            .rest
            .update::<Product, _>(&Filter::new().eq("id", id), input)
            .await?;
        self.invalidate(CacheKey::Products).await;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), BackendError> {
        self.rest
            .delete::<Product>(&Filter::new().eq("id", id))
            .await?;
        self.invalidate(CacheKey::Products).await;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, BackendError> {
        self.rest.select(&newest_first()).await
    }

    /// Orders placed with this email, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, email))]
    pub async fn orders_for_email(&self, email: &str) -> Result<Vec<Order>, BackendError> {
        self.rest
            .select(&newest_first().eq("customer_email", email))
            .await
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, BackendError> {
        self.rest.select_one(Filter::new().eq("id", id)).await
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, order), fields(items = order.items.len()))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        self.rest.insert::<Order, _>(order).await
    }

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no row has this id.
    #[instrument(skip(self, status), fields(order_id = %id, status = %status))]
    pub async fn set_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        self.rest
            .update::<Order, _>(&Filter::new().eq("id", id), &OrderStatusPatch { status })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("order {id}")))
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), BackendError> {
        self.rest.delete::<Order>(&Filter::new().eq("id", id)).await
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// All reviews in any status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_reviews(&self) -> Result<Vec<Review>, BackendError> {
        self.rest.select(&newest_first()).await
    }

    /// Approved reviews across all products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn approved_reviews(&self) -> Result<Vec<Review>, BackendError> {
        if let Some(CacheValue::ApprovedReviews(reviews)) =
            self.cached(CacheKey::ApprovedReviews).await
        {
            return Ok(reviews);
        }

        let reviews: Vec<Review> = self
            .rest
            .select(&newest_first().eq("status", ReviewStatus::Approved))
            .await?;
        self.store(
            CacheKey::ApprovedReviews,
            CacheValue::ApprovedReviews(reviews.clone()),
        )
        .await;
        Ok(reviews)
    }

    /// Approved reviews for one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    pub async fn approved_reviews_for(&self, id: &ProductId) -> Result<Vec<Review>, BackendError> {
        Ok(self
            .approved_reviews()
            .await?
            .into_iter()
            .filter(|r| &r.product_id == id)
            .collect())
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, review), fields(product_id = %review.product_id))]
    pub async fn create_review(&self, review: &NewReview) -> Result<Review, BackendError> {
        let created = self.rest.insert::<Review, _>(review).await?;
        self.invalidate(CacheKey::ApprovedReviews).await;
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no row has this id.
    #[instrument(skip(self, status), fields(review_id = %id, status = %status))]
    pub async fn set_review_status(
        &self,
        id: &ReviewId,
        status: ReviewStatus,
    ) -> Result<Review, BackendError> {
        let review = self
            .rest
            .update::<Review, _>(&Filter::new().eq("id", id), &ReviewStatusPatch { status })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("review {id}")))?;
        self.invalidate(CacheKey::ApprovedReviews).await;
        Ok(review)
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self), fields(review_id = %id))]
    pub async fn delete_review(&self, id: &ReviewId) -> Result<(), BackendError> {
        self.rest.delete::<Review>(&Filter::new().eq("id", id)).await?;
        self.invalidate(CacheKey::ApprovedReviews).await;
        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_accounts(&self) -> Result<Vec<Account>, BackendError> {
        self.rest.select(&newest_first()).await
    }

    /// # Errors
    ///
    /// Returns `BackendError` if the request fails; callers decide whether a
    /// missing table is fatal.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_account(&self, id: &UserId) -> Result<Option<Account>, BackendError> {
        self.rest.select_one(Filter::new().eq("id", id)).await
    }

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the visitor has no account row.
    #[instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_account_profile(
        &self,
        id: &UserId,
        patch: &AccountProfilePatch,
    ) -> Result<Account, BackendError> {
        self.rest
            .update::<Account, _>(&Filter::new().eq("id", id), patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("account {id}")))
    }

    /// Update the role column. Zero matched rows is not an error; the user
    /// may simply have no account row yet.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self, role), fields(user_id = %id, role = %role))]
    pub async fn set_account_role(&self, id: &UserId, role: Role) -> Result<(), BackendError> {
        self.rest
            .update::<Account, _>(&Filter::new().eq("id", id), &AccountRolePatch { role })
            .await?;
        Ok(())
    }

    // =========================================================================
    // Site settings
    // =========================================================================

    /// The settings row, if one has been saved.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the request fails.
    #[instrument(skip(self))]
    pub async fn get_settings(&self) -> Result<Option<SiteSettings>, BackendError> {
        if let Some(CacheValue::Settings(settings)) = self.cached(CacheKey::Settings).await {
            return Ok(settings.map(|s| *s));
        }

        let settings: Option<SiteSettings> = self.rest.select_one(Filter::new()).await?;
        self.store(
            CacheKey::Settings,
            CacheValue::Settings(settings.clone().map(Box::new)),
        )
        .await;
        Ok(settings)
    }

    /// Update the first settings row, or insert one if the table is empty.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if either request fails.
    #[instrument(skip(self, input))]
    pub async fn upsert_settings(
        &self,
        input: &SiteSettingsInput,
    ) -> Result<SiteSettings, BackendError> {
        let existing: Option<SiteSettings> =
            self.rest.select_one(Filter::new().select("id")).await?;

        let saved = match existing.and_then(|s| s.id) {
            Some(id) => self
                .rest
                .update::<SiteSettings, _>(&Filter::new().eq("id", id), input)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::NotFound("site settings".to_string()))?,
            None => self.rest.insert::<SiteSettings, _>(input).await?,
        };

        self.invalidate(CacheKey::Settings).await;
        Ok(saved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RoleSource};
    use alpine_guardian_core::Price;
    use mockito::Matcher;

    fn client(server: &mockito::Server, ttl: Option<Duration>) -> DataClient {
        let config = BackendConfig::new(&server.url(), "anon-key", RoleSource::AccountTable).unwrap();
        DataClient::new(Transport::new(&config), ttl)
    }

    const PRODUCTS: &str = r#"[
        {"id": 1, "name": "Avalanche Kit", "price": 120.5, "created_date": "2025-01-02T00:00:00+00:00"},
        {"id": 2, "name": "Radio Beacon", "price": 80}
    ]"#;

    #[tokio::test]
    async fn test_list_products_sends_headers_and_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/Product")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer anon-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("order".into(), "created_date.desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PRODUCTS)
            .create_async()
            .await;

        let products = client(&server, None).list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, Price::from_cents(12050));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_product_list_is_cached_until_write() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/rest/v1/Product")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(PRODUCTS)
            .expect(2)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/rest/v1/Product")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.2".into()))
            .with_status(204)
            .create_async()
            .await;

        let data = client(&server, Some(Duration::from_secs(60)));
        data.list_products().await.unwrap();
        data.list_products().await.unwrap();
        let found = data.get_product(&ProductId::new("1")).await.unwrap();
        assert_eq!(found.map(|p| p.name), Some("Avalanche Kit".to_string()));

        data.delete_product(&ProductId::new("2")).await.unwrap();
        data.list_products().await.unwrap();

        list.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_authed_client_uses_visitor_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/Order")
            .match_header("authorization", "Bearer visitor-jwt")
            .match_query(Matcher::UrlEncoded(
                "customer_email".into(),
                "eq.sam@resort.com".into(),
            ))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let data = client(&server, None).authed(SecretString::from("visitor-jwt"));
        let orders = data.orders_for_email("sam@resort.com").await.unwrap();
        assert!(orders.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_order_status_patches_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/rest/v1/Order")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.9".into()))
            .match_header("prefer", "return=representation")
            .match_body(Matcher::Json(serde_json::json!({"status": "completed"})))
            .with_status(200)
            .with_body(r#"[{"id": 9, "total": 10, "status": "completed", "items": []}]"#)
            .create_async()
            .await;

        let order = client(&server, None)
            .set_order_status(&OrderId::new("9"), OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(order.status(), Some(OrderStatus::Completed));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_settings_inserts_when_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/SiteSettings")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/rest/v1/SiteSettings")
            .with_status(201)
            .with_body(r#"[{"id": 1, "tagline": "Safety first"}]"#)
            .create_async()
            .await;

        let input = SiteSettingsInput {
            tagline: Some("Safety first".into()),
            ..SiteSettingsInput::default()
        };
        let saved = client(&server, None).upsert_settings(&input).await.unwrap();
        assert_eq!(saved.tagline.as_deref(), Some("Safety first"));
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_settings_updates_first_row() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/SiteSettings")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id": 4}]"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/rest/v1/SiteSettings")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.4".into()))
            .with_status(200)
            .with_body(r#"[{"id": 4, "contact_email": "ops@patrol.org"}]"#)
            .create_async()
            .await;

        let input = SiteSettingsInput {
            contact_email: Some("ops@patrol.org".into()),
            ..SiteSettingsInput::default()
        };
        client(&server, None).upsert_settings(&input).await.unwrap();
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/Review")
            .with_status(403)
            .with_body(r#"{"code":"42501","message":"new row violates row-level security policy"}"#)
            .create_async()
            .await;

        let review = NewReview {
            product_id: ProductId::new("1"),
            product_name: "Kit".into(),
            user_name: "Sam".into(),
            user_email: "sam@resort.com".into(),
            rating: 5,
            comment: "Great".into(),
            status: ReviewStatus::Approved,
        };
        let err = client(&server, None).create_review(&review).await.unwrap_err();
        assert_eq!(err.to_string(), "new row violates row-level security policy");
        assert!(err.is_unauthorized());
    }
}
