//! Shared HTTP transport for every hosted-backend client.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::BackendConfig;
use crate::error::BackendError;

#[derive(Clone)]
pub(crate) struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    client: reqwest::Client,
    base: String,
    anon_key: SecretString,
}

impl Transport {
    pub(crate) fn new(config: &BackendConfig) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                client: reqwest::Client::new(),
                base: config.base().to_string(),
                anon_key: config.anon_key.clone(),
            }),
        }
    }

    /// Project base URL without the trailing slash.
    pub(crate) fn base(&self) -> &str {
        &self.inner.base
    }

    /// Absolute URL for a service path such as `rest/v1/Product`.
    pub(crate) fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/{}", self.inner.base, path.trim_start_matches('/')))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Start a request carrying the anon key and a bearer token.
    ///
    /// Without a visitor token the anon key doubles as the bearer, which is
    /// what the hosted services expect for anonymous calls.
    pub(crate) fn request(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&SecretString>,
    ) -> RequestBuilder {
        let anon = self.inner.anon_key.expose_secret();
        let token = bearer.map_or(anon, |t| t.expose_secret());
        self.inner
            .client
            .request(method, url)
            .header("apikey", anon)
            .bearer_auth(token)
    }

    /// Send and return the body text, turning non-success statuses into
    /// [`BackendError::Api`].
    pub(crate) async fn execute(&self, builder: RequestBuilder) -> Result<String, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Hosted backend returned non-success status"
            );
            return Err(BackendError::from_response(status.as_u16(), &body));
        }

        Ok(body)
    }

    /// Send and parse the JSON body.
    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.execute(builder).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse hosted backend response"
            );
            BackendError::Parse(e)
        })
    }
}
