use serde::{Deserialize, Serialize};

use crate::types::SettingsId;

/// The singleton `SiteSettings` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default, skip_serializing)]
    pub id: Option<SettingsId>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub instagram_url: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

impl SiteSettings {
    /// Social links that are set, as `(label, url)` pairs.
    #[must_use]
    pub fn social_links(&self) -> Vec<(&'static str, &str)> {
        [
            ("Facebook", &self.facebook_url),
            ("Twitter", &self.twitter_url),
            ("Instagram", &self.instagram_url),
            ("LinkedIn", &self.linkedin_url),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.as_deref()
                .filter(|u| !u.trim().is_empty())
                .map(|u| (label, u))
        })
        .collect()
    }
}

/// Writable columns of the settings row. Blank form fields become `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteSettingsInput {
    pub logo_url: Option<String>,
    pub tagline: Option<String>,
    pub contact_email: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub instagram_url: Option<String>,
    pub linkedin_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_links_skip_blank() {
        let settings = SiteSettings {
            facebook_url: Some("https://facebook.com/patrol".into()),
            twitter_url: Some("  ".into()),
            linkedin_url: Some("https://linkedin.com/company/patrol".into()),
            ..SiteSettings::default()
        };
        let labels: Vec<_> = settings.social_links().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Facebook", "LinkedIn"]);
    }
}
