//! Product management route handlers.
//!
//! Create and edit forms are multipart so a template archive can ride along
//! with the product fields. The archive is uploaded to storage first and its
//! public URL stored on the product.

use alpine_guardian_backend::storage::MAX_TEMPLATE_BYTES;
use alpine_guardian_backend::{AuthContext, BackendError};
use alpine_guardian_core::models::{Product, ProductInput};
use alpine_guardian_core::{Price, ProductId, SubscriptionInterval};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::instrument;

use super::dashboard::AdminUserView;
use super::{FlashQuery, SelectOption, redirect_error, redirect_success, select_options};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;
use crate::variations;

/// Room for the archive plus the text fields.
const BODY_LIMIT: usize = MAX_TEMPLATE_BYTES + 1024 * 1024;

const MESSAGES: &[(&str, &str)] = &[
    ("created", "Product created."),
    ("updated", "Product updated."),
    ("deleted", "Product deleted."),
];

// =============================================================================
// Views
// =============================================================================

/// Product row for the listing.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub subscription: bool,
    pub variation_count: usize,
    pub template_url: Option<String>,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image: product.gallery().first().map(|s| (*s).to_string()),
            price: product.price_label(),
            subscription: product.is_subscription,
            variation_count: product.variations.len(),
            template_url: product.template_url.clone(),
        }
    }
}

/// Raw form fields, kept as typed so the form can be shown again on error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub description: String,
    pub image: String,
    pub images: String,
    pub is_subscription: bool,
    pub subscription_interval: String,
    pub stripe_price_id: String,
    pub stripe_recurring_price_id: String,
    pub template_url: String,
    pub variations: String,
}

/// An uploaded template archive.
#[derive(Debug)]
pub struct TemplateUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl ProductForm {
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price.amount().to_string(),
            description: product.description.clone(),
            image: product.image.clone().unwrap_or_default(),
            images: product.images.join("\n"),
            is_subscription: product.is_subscription,
            subscription_interval: product.subscription_interval.clone().unwrap_or_default(),
            stripe_price_id: product.stripe_price_id.clone().unwrap_or_default(),
            stripe_recurring_price_id: product
                .stripe_recurring_price_id
                .clone()
                .unwrap_or_default(),
            template_url: product.template_url.clone().unwrap_or_default(),
            variations: variations::format(&product.variations),
        }
    }

    fn set(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = value,
            "price" => self.price = value,
            "description" => self.description = value,
            "image" => self.image = value,
            "images" => self.images = value,
            "is_subscription" => self.is_subscription = !value.is_empty(),
            "subscription_interval" => self.subscription_interval = value,
            "stripe_price_id" => self.stripe_price_id = value,
            "stripe_recurring_price_id" => self.stripe_recurring_price_id = value,
            "template_url" => self.template_url = value,
            "variations" => self.variations = value,
            other => tracing::debug!(field = other, "Ignoring unknown product form field"),
        }
    }

    #[must_use]
    pub fn interval_options(&self) -> Vec<SelectOption> {
        select_options(
            SubscriptionInterval::ALL.iter().map(SubscriptionInterval::as_str),
            &self.subscription_interval,
        )
    }

    /// Check the fields and build the row to write.
    ///
    /// # Errors
    ///
    /// Returns the message to show above the form.
    pub fn validate(&self) -> std::result::Result<ProductInput, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Product name is required.".to_string());
        }

        let price = self
            .price
            .trim()
            .parse::<Price>()
            .map_err(|_| "Price must be a number, e.g. 49.99.".to_string())?;
        if price.amount().is_sign_negative() && !price.is_zero() {
            return Err("Price cannot be negative.".to_string());
        }

        let subscription_interval = if self.is_subscription {
            let interval = self
                .subscription_interval
                .parse::<SubscriptionInterval>()
                .map_err(|_| "Choose a billing interval for subscription products.".to_string())?;
            Some(interval.as_str().to_string())
        } else {
            None
        };

        let variations = variations::parse(&self.variations).map_err(|e| e.to_string())?;

        Ok(ProductInput {
            name: name.to_string(),
            price,
            description: self.description.trim().to_string(),
            image: optional(&self.image),
            images: self
                .images
                .lines()
                .filter_map(optional)
                .collect(),
            is_subscription: self.is_subscription,
            subscription_interval,
            stripe_price_id: optional(&self.stripe_price_id),
            stripe_recurring_price_id: optional(&self.stripe_recurring_price_id),
            template_url: optional(&self.template_url),
            variations,
        })
    }
}

/// Products page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub products: Vec<ProductRow>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub heading: String,
    pub action: String,
    pub intervals: Vec<SelectOption>,
    pub form: ProductForm,
    pub error_message: Option<String>,
}

impl ProductFormTemplate {
    fn new(
        ctx: &AuthContext,
        state: &AppState,
        product_id: Option<&ProductId>,
        form: ProductForm,
        error_message: Option<String>,
    ) -> Self {
        let (heading, action) = match product_id {
            Some(id) => ("Edit Product".to_string(), format!("/products/{id}")),
            None => ("New Product".to_string(), "/products".to_string()),
        };
        Self {
            admin_user: AdminUserView::new(ctx, state),
            current_path: "/products".to_string(),
            heading,
            action,
            intervals: form.interval_options(),
            form,
            error_message,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/new", get(new_form))
        .route("/products/{id}/edit", get(edit_form))
        .route("/products/{id}", post(update))
        .route("/products/{id}/delete", post(delete))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

/// Read the multipart body into form fields and an optional archive.
async fn read_form(
    mut multipart: Multipart,
) -> std::result::Result<(ProductForm, Option<TemplateUpload>), String> {
    let mut form = ProductForm::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "template" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field.bytes().await.map_err(|e| e.to_string())?;
            // Browsers send an empty part when no file was chosen.
            if !file_name.is_empty() || !bytes.is_empty() {
                upload = Some(TemplateUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(|e| e.to_string())?;
        form.set(&name, value);
    }

    Ok((form, upload))
}

/// Validate, upload the archive if any, and return the row to write.
async fn prepare(
    state: &AppState,
    ctx: &AuthContext,
    form: &ProductForm,
    upload: Option<TemplateUpload>,
) -> std::result::Result<ProductInput, String> {
    let mut input = form.validate()?;

    if let Some(upload) = upload {
        let bearer = ctx
            .bearer()
            .ok_or_else(|| "Sign in again to upload templates.".to_string())?;
        let url = state
            .backend()
            .storage
            .upload_template(&upload.file_name, upload.bytes, &bearer)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Template upload failed");
                e.to_string()
            })?;
        input.template_url = Some(url);
    }

    Ok(input)
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /products
#[instrument(skip_all)]
async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let (products, load_error) = match ctx.data(state.backend()).list_products().await {
        Ok(products) => (products.iter().map(ProductRow::from).collect(), None),
        Err(e) => {
            tracing::error!("Failed to fetch products: {e}");
            (Vec::new(), Some(e.to_string()))
        }
    };

    ProductsTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/products".to_string(),
        products,
        success_message: flash.success_message(MESSAGES),
        error_message: flash.error_message().or(load_error),
    }
}

/// GET /products/new
#[instrument(skip_all)]
async fn new_form(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ProductFormTemplate::new(&ctx, &state, None, ProductForm::default(), None)
}

/// POST /products
#[instrument(skip_all)]
async fn create(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let (form, upload) = match read_form(multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return redirect_error("/products", &e).into_response(),
    };

    let input = match prepare(&state, &ctx, &form, upload).await {
        Ok(input) => input,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                ProductFormTemplate::new(&ctx, &state, None, form, Some(message)),
            )
                .into_response();
        }
    };

    match ctx.data(state.backend()).create_product(&input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "Product created");
            redirect_success("/products", "created").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create product");
            ProductFormTemplate::new(&ctx, &state, None, form, Some(e.to_string()))
                .into_response()
        }
    }
}

/// GET /products/{id}/edit
#[instrument(skip_all, fields(product_id = %id))]
async fn edit_form(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    let product = ctx
        .data(state.backend())
        .get_product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductFormTemplate::new(
        &ctx,
        &state,
        Some(&id),
        ProductForm::from_product(&product),
        None,
    )
    .into_response())
}

/// POST /products/{id}
#[instrument(skip_all, fields(product_id = %id))]
async fn update(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Response {
    let (form, upload) = match read_form(multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return redirect_error("/products", &e).into_response(),
    };

    let input = match prepare(&state, &ctx, &form, upload).await {
        Ok(input) => input,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                ProductFormTemplate::new(&ctx, &state, Some(&id), form, Some(message)),
            )
                .into_response();
        }
    };

    match ctx.data(state.backend()).update_product(&id, &input).await {
        Ok(_) => {
            tracing::info!("Product updated");
            redirect_success("/products", "updated").into_response()
        }
        Err(BackendError::NotFound(_)) => {
            redirect_error("/products", "That product no longer exists.").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to update product");
            ProductFormTemplate::new(&ctx, &state, Some(&id), form, Some(e.to_string()))
                .into_response()
        }
    }
}

/// POST /products/{id}/delete
#[instrument(skip_all, fields(product_id = %id))]
async fn delete(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Redirect {
    match ctx.data(state.backend()).delete_product(&id).await {
        Ok(()) => {
            tracing::info!("Product deleted");
            redirect_success("/products", "deleted")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete product");
            redirect_error("/products", &e.to_string())
        }
    }
}
