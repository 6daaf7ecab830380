//! Site settings routes.
//!
//! One settings row drives the storefront header and footer: logo, tagline,
//! contact email and social links. Saving updates the row or creates it.

use alpine_guardian_core::Email;
use alpine_guardian_core::models::{SiteSettings, SiteSettingsInput};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use super::dashboard::AdminUserView;
use super::{FlashQuery, redirect_success};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Settings form fields. Blank fields clear the column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    pub logo_url: String,
    pub tagline: String,
    pub contact_email: String,
    pub facebook_url: String,
    pub twitter_url: String,
    pub instagram_url: String,
    pub linkedin_url: String,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl From<&SiteSettings> for SettingsForm {
    fn from(settings: &SiteSettings) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            logo_url: text(&settings.logo_url),
            tagline: text(&settings.tagline),
            contact_email: text(&settings.contact_email),
            facebook_url: text(&settings.facebook_url),
            twitter_url: text(&settings.twitter_url),
            instagram_url: text(&settings.instagram_url),
            linkedin_url: text(&settings.linkedin_url),
        }
    }
}

impl SettingsForm {
    /// # Errors
    ///
    /// Returns the message to show when the contact email is malformed.
    pub fn validate(&self) -> Result<SiteSettingsInput, String> {
        let contact_email = match optional(&self.contact_email) {
            Some(raw) => Some(
                Email::parse(&raw)
                    .map_err(|e| format!("Contact email: {e}"))?
                    .into_inner(),
            ),
            None => None,
        };

        Ok(SiteSettingsInput {
            logo_url: optional(&self.logo_url),
            tagline: optional(&self.tagline),
            contact_email,
            facebook_url: optional(&self.facebook_url),
            twitter_url: optional(&self.twitter_url),
            instagram_url: optional(&self.instagram_url),
            linkedin_url: optional(&self.linkedin_url),
        })
    }
}

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub form: SettingsForm,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(index).post(save))
}

/// GET /settings
#[instrument(skip_all)]
async fn index(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let (form, load_error) = match ctx.data(state.backend()).get_settings().await {
        Ok(settings) => (
            settings.as_ref().map(SettingsForm::from).unwrap_or_default(),
            None,
        ),
        Err(e) => {
            tracing::error!("Failed to fetch site settings: {e}");
            (SettingsForm::default(), Some(e.to_string()))
        }
    };

    SettingsTemplate {
        admin_user: AdminUserView::new(&ctx, &state),
        current_path: "/settings".to_string(),
        form,
        success_message: flash.success_message(&[("saved", "Settings saved.")]),
        error_message: flash.error_message().or(load_error),
    }
}

/// POST /settings
#[instrument(skip_all)]
async fn save(
    RequireAdmin(ctx): RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let render_error = |form: SettingsForm, message: String, status: StatusCode| {
        (
            status,
            SettingsTemplate {
                admin_user: AdminUserView::new(&ctx, &state),
                current_path: "/settings".to_string(),
                form,
                success_message: None,
                error_message: Some(message),
            },
        )
            .into_response()
    };

    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => return render_error(form, message, StatusCode::BAD_REQUEST),
    };

    match ctx.data(state.backend()).upsert_settings(&input).await {
        Ok(_) => {
            tracing::info!("Site settings saved");
            redirect_success("/settings", "saved").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save site settings");
            render_error(form, e.to_string(), StatusCode::BAD_GATEWAY)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_become_null() {
        let form = SettingsForm {
            tagline: "  Gear for the people who keep the mountain safe ".to_string(),
            contact_email: " Patrol@Example.com ".to_string(),
            ..SettingsForm::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(
            input.tagline.as_deref(),
            Some("Gear for the people who keep the mountain safe")
        );
        assert!(input.contact_email.is_some());
        assert_eq!(input.logo_url, None);
        assert_eq!(input.linkedin_url, None);
    }

    #[test]
    fn test_bad_contact_email_is_rejected() {
        let form = SettingsForm {
            contact_email: "not-an-email".to_string(),
            ..SettingsForm::default()
        };
        assert!(form.validate().unwrap_err().starts_with("Contact email"));
    }
}
