//! Review moderation route handlers.

use alpine_guardian_core::models::Review;
use alpine_guardian_core::{ReviewId, ReviewStatus};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use super::dashboard::AdminUserView;
use super::{FlashQuery, SelectOption, redirect_error, redirect_success, select_options};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Review row for the listing.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub date: String,
    pub product_name: String,
    pub user_name: String,
    pub user_email: String,
    pub stars: String,
    pub comment: String,
    pub status: String,
    pub status_options: Vec<SelectOption>,
}

impl From<&Review> for ReviewRow {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.to_string(),
            date: review
                .created_date
                .map(|d| d.format("%b %d, %Y").to_string())
                .unwrap_or_default(),
            product_name: review.product_name.clone(),
            user_name: review.user_name.clone(),
            user_email: review.user_email.clone(),
            stars: review.stars(),
            comment: review.comment.clone(),
            status: review.status.clone(),
            status_options: select_options(
                ReviewStatus::ALL.iter().map(ReviewStatus::as_str),
                &review.status,
            ),
        }
    }
}

/// Reviews page template.
#[derive(Template, WebTemplate)]
#[template(path = "reviews.html")]
pub struct ReviewsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub reviews: Vec<ReviewRow>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Build the reviews router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(index))
        .route("/reviews/{id}/status", post(update_status))
        .route("/reviews/{id}/delete", post(delete))
}

const MESSAGES: &[(&str, &str)] = &[
    ("status_updated", "Review status updated."),
    ("deleted", "Review deleted."),
];

/// GET /reviews
#[instrument(skip_all)]
async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let (reviews, load_error) = match ctx.data(state.backend()).list_reviews().await {
        Ok(reviews) => (reviews.iter().map(ReviewRow::from).collect(), None),
        Err(e) => {
            tracing::error!("Failed to fetch reviews: {e}");
            (Vec::new(), Some(e.to_string()))
        }
    };

    ReviewsTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/reviews".to_string(),
        reviews,
        success_message: flash.success_message(MESSAGES),
        error_message: flash.error_message().or(load_error),
    }
}

/// POST /reviews/{id}/status
#[instrument(skip_all, fields(review_id = %id))]
async fn update_status(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let status = match form.status.parse::<ReviewStatus>() {
        Ok(status) => status,
        Err(e) => return redirect_error("/reviews", &e.to_string()),
    };

    match ctx
        .data(state.backend())
        .set_review_status(&id, status)
        .await
    {
        Ok(_) => {
            tracing::info!(%status, "Review moderated");
            redirect_success("/reviews", "status_updated")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to update review status");
            redirect_error("/reviews", &e.to_string())
        }
    }
}

/// POST /reviews/{id}/delete
#[instrument(skip_all, fields(review_id = %id))]
async fn delete(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Redirect {
    match ctx.data(state.backend()).delete_review(&id).await {
        Ok(()) => {
            tracing::info!("Review deleted");
            redirect_success("/reviews", "deleted")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete review");
            redirect_error("/reviews", &e.to_string())
        }
    }
}
