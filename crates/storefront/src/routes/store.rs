//! Catalog and product detail pages, and review submission.

use alpine_guardian_backend::{AuthContext, DataClient};
use alpine_guardian_core::catalog::{ProductQuery, RatingIndex, SortKey};
use alpine_guardian_core::models::{NewReview, Product};
use alpine_guardian_core::{Price, ProductId, ReviewStatus};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireUser, Viewer};
use crate::models::load_cart;
use crate::pages::Page;
use crate::routes::not_found_page;
use crate::state::AppState;
use crate::views::{ProductCard, ReviewView, Shell};

/// Prefix of the form fields carrying variation selections
/// (`opt:<variation name>`).
pub const SELECTION_FIELD_PREFIX: &str = "opt:";

/// Ratings from approved reviews. An unavailable review table just means no
/// rating indicators.
pub(crate) async fn load_ratings(data: &DataClient) -> RatingIndex {
    match data.approved_reviews().await {
        Ok(reviews) => RatingIndex::from_reviews(&reviews),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load reviews; hiding ratings");
            RatingIndex::default()
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog query parameters. Everything arrives as text so a malformed price
/// is ignored instead of rejecting the page.
#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    #[serde(default)]
    pub search: String,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
}

fn parse_price(raw: Option<&str>) -> Option<Price> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

impl StoreQuery {
    #[must_use]
    pub fn to_product_query(&self) -> ProductQuery {
        ProductQuery {
            search: self.search.trim().to_string(),
            min_price: parse_price(self.min_price.as_deref()),
            max_price: parse_price(self.max_price.as_deref()),
            sort: self.sort.as_deref().map(SortKey::parse).unwrap_or_default(),
        }
    }
}

/// Sort dropdown entry.
#[derive(Clone)]
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "store/index.html")]
pub struct StoreIndexTemplate {
    pub shell: Shell,
    pub products: Vec<ProductCard>,
    pub search: String,
    pub min_price: String,
    pub max_price: String,
    pub sort_options: Vec<SortOption>,
    pub error: Option<String>,
}

/// Display the catalog, filtered and sorted.
#[instrument(skip(state, ctx, session))]
pub async fn index(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Query(query): Query<StoreQuery>,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    let shell = Shell::build(&state, &ctx, &cart).await;
    let filters = query.to_product_query();

    let data = &state.backend().data;
    let (products, error) = match data.list_products().await {
        Ok(products) => {
            let ratings = load_ratings(data).await;
            let cards = filters
                .apply(&products, &ratings)
                .into_iter()
                .map(|p| ProductCard::new(p, &ratings))
                .collect();
            (cards, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load products");
            (Vec::new(), Some(e.to_string()))
        }
    };

    StoreIndexTemplate {
        shell,
        products,
        search: query.search,
        min_price: query.min_price.unwrap_or_default(),
        max_price: query.max_price.unwrap_or_default(),
        sort_options: SortKey::ALL
            .iter()
            .map(|key| SortOption {
                value: key.as_str(),
                label: key.label(),
                selected: *key == filters.sort,
            })
            .collect(),
        error,
    }
}

// =============================================================================
// Product detail
// =============================================================================

/// `?id=` parameter.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
    /// Set after a review was stored.
    pub reviewed: Option<String>,
}

/// One option in a variation selector.
#[derive(Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
}

/// A variation selector.
#[derive(Clone)]
pub struct VariationView {
    pub name: String,
    pub field: String,
    pub options: Vec<OptionView>,
}

/// Product display data for the detail page.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub description: String,
    pub gallery: Vec<String>,
    pub variations: Vec<VariationView>,
    pub is_subscription: bool,
    pub template_url: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price_label(),
            description: product.description.clone(),
            gallery: product.gallery().into_iter().map(String::from).collect(),
            variations: product
                .variations
                .iter()
                .filter(|v| !v.options.is_empty())
                .map(|v| VariationView {
                    name: v.name.clone(),
                    field: format!("{SELECTION_FIELD_PREFIX}{}", v.name),
                    options: v
                        .options
                        .iter()
                        .map(|o| OptionView {
                            value: o.value.clone(),
                            label: if o.price_adjustment.is_zero() {
                                o.value.clone()
                            } else {
                                format!("{} ({})", o.value, o.price_adjustment.display_signed())
                            },
                        })
                        .collect(),
                })
                .collect(),
            is_subscription: product.is_subscription,
            template_url: product.template_url.clone().filter(|u| !u.trim().is_empty()),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "store/product.html")]
pub struct ProductShowTemplate {
    pub shell: Shell,
    pub product: ProductView,
    pub rating: Option<String>,
    pub review_count: u32,
    pub reviews: Vec<ReviewView>,
    pub can_review: bool,
    pub review_notice: Option<String>,
    pub review_error: Option<String>,
}

async fn render_product(
    state: &AppState,
    ctx: &AuthContext,
    session: &Session,
    id: &ProductId,
    review_notice: Option<String>,
    review_error: Option<String>,
) -> Result<Response> {
    let data = ctx.data(state.backend());
    let Some(product) = data.get_product(id).await? else {
        return Ok(not_found_page(state, ctx, session).await);
    };

    // Reviews failing to load only hides them.
    let reviews = match data.approved_reviews_for(id).await {
        Ok(reviews) => reviews,
        Err(e) => {
            tracing::warn!(error = %e, product_id = %id, "Failed to load reviews");
            Vec::new()
        }
    };
    let summary = RatingIndex::from_reviews(&reviews).summary(id);

    let cart = load_cart(session).await;
    Ok(ProductShowTemplate {
        shell: Shell::build(state, ctx, &cart).await,
        product: ProductView::from(&product),
        rating: summary.as_ref().map(|s| s.display()),
        review_count: summary.map_or(0, |s| s.count),
        reviews: reviews.iter().map(ReviewView::from).collect(),
        can_review: ctx.is_authenticated(),
        review_notice,
        review_error,
    }
    .into_response())
}

/// Display a product.
#[instrument(skip(state, ctx, session))]
pub async fn show(
    State(state): State<AppState>,
    Viewer(ctx): Viewer,
    session: Session,
    Query(query): Query<IdQuery>,
) -> Result<Response> {
    let Some(id) = query.id.filter(|id| !id.trim().is_empty()) else {
        return Ok(not_found_page(&state, &ctx, &session).await);
    };
    let notice = query
        .reviewed
        .map(|_| "Thanks! Your review has been posted.".to_string());
    render_product(&state, &ctx, &session, &ProductId::new(id), notice, None).await
}

// =============================================================================
// Reviews
// =============================================================================

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub product_id: String,
    pub rating: String,
    #[serde(default)]
    pub comment: String,
}

impl ReviewForm {
    /// Validated rating and trimmed comment.
    ///
    /// # Errors
    ///
    /// Returns a message for the page when the rating is not 1 to 5 or the
    /// comment is empty.
    pub fn validate(&self) -> std::result::Result<(u8, String), String> {
        let rating = self
            .rating
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| "Please choose a rating from 1 to 5 stars.".to_string())?;
        let comment = self.comment.trim();
        if comment.is_empty() {
            return Err("Please write a comment.".to_string());
        }
        Ok((rating, comment.to_string()))
    }
}

/// Store a review from the signed-in visitor. Reviews go live immediately.
#[instrument(skip(state, ctx, session, form), fields(product_id = %form.product_id))]
pub async fn submit_review(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    session: Session,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id.trim());
    let (rating, comment) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            return render_product(&state, &ctx, &session, &id, None, Some(message)).await;
        }
    };

    let user = ctx
        .user()
        .ok_or_else(|| AppError::Unauthorized("sign in to review".to_string()))?;
    let data = ctx.data(state.backend());
    let Some(product) = data.get_product(&id).await? else {
        return Ok(not_found_page(&state, &ctx, &session).await);
    };

    let review = NewReview {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        user_name: user.display_name(),
        user_email: user.email.clone().unwrap_or_default(),
        rating,
        comment,
        status: ReviewStatus::Approved,
    };

    match data.create_review(&review).await {
        Ok(_) => {
            add_breadcrumb("review", "Posted review", Some(&[("product_id", id.as_str())]));
            Ok(Redirect::to(&format!("{}&reviewed=1", Page::ProductDetail.with_id(&id))).into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to store review");
            render_product(&state, &ctx, &session, &id, None, Some(e.to_string())).await
        }
    }
}
