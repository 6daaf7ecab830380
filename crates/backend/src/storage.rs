//! Object storage for downloadable product templates.

use reqwest::Method;
use secrecy::SecretString;
use tracing::instrument;

use crate::error::BackendError;
use crate::http::Transport;

/// Bucket holding product template archives.
pub const TEMPLATE_BUCKET: &str = "product-templates";

/// Largest accepted template archive.
pub const MAX_TEMPLATE_BYTES: usize = 50 * 1024 * 1024;

/// Client for `/storage/v1`.
#[derive(Clone)]
pub struct StorageClient {
    transport: Transport,
}

/// Object key for an uploaded file: a random prefix plus the file name
/// reduced to `[A-Za-z0-9._-]`.
fn object_key(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{cleaned}", uuid::Uuid::new_v4())
}

/// Only `.zip` archives are accepted.
///
/// # Errors
///
/// Returns `BackendError::InvalidUpload` describing the problem.
pub fn validate_template(file_name: &str, size: usize) -> Result<(), BackendError> {
    if !file_name.to_ascii_lowercase().ends_with(".zip") {
        return Err(BackendError::InvalidUpload(
            "Templates must be .zip files".to_string(),
        ));
    }
    if size == 0 {
        return Err(BackendError::InvalidUpload("The file is empty".to_string()));
    }
    if size > MAX_TEMPLATE_BYTES {
        return Err(BackendError::InvalidUpload(format!(
            "Templates must be at most {} MB",
            MAX_TEMPLATE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

impl StorageClient {
    pub(crate) const fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Public download URL for an object in the template bucket.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{TEMPLATE_BUCKET}/{key}",
            self.transport.base()
        )
    }

    /// Upload a template archive and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidUpload` for non-zip or empty files, or
    /// the storage service's error.
    #[instrument(skip(self, bytes, bearer), fields(size = bytes.len()))]
    pub async fn upload_template(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        bearer: &SecretString,
    ) -> Result<String, BackendError> {
        validate_template(file_name, bytes.len())?;

        let key = object_key(file_name);
        let url = self
            .transport
            .url(&format!("storage/v1/object/{TEMPLATE_BUCKET}/{key}"), &[])?;
        let request = self
            .transport
            .request(Method::POST, url, Some(bearer))
            .header("content-type", "application/zip")
            .header("x-upsert", "false")
            .body(bytes);
        self.transport.execute(request).await?;

        tracing::info!(%key, "Uploaded product template");
        Ok(self.public_url(&key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RoleSource};
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> StorageClient {
        let config = BackendConfig::new(&server.url(), "anon-key", RoleSource::Metadata).unwrap();
        StorageClient::new(Transport::new(&config))
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("kit.zip", 10).is_ok());
        assert!(validate_template("KIT.ZIP", 10).is_ok());
        assert!(validate_template("kit.pdf", 10).is_err());
        assert!(validate_template("kit.zip", 0).is_err());
    }

    #[test]
    fn test_object_key_sanitizes_name() {
        let key = object_key("C:\\Users\\me\\Shift Log (v2).zip");
        assert!(key.ends_with("-Shift-Log--v2-.zip"));
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/storage/v1/object/product-templates/.+-kit\.zip$".into()),
            )
            .match_header("content-type", "application/zip")
            .match_header("authorization", "Bearer admin-jwt")
            .with_status(200)
            .with_body(r#"{"Key": "product-templates/x-kit.zip"}"#)
            .create_async()
            .await;

        let url = client(&server)
            .upload_template("kit.zip", b"PK\x03\x04".to_vec(), &SecretString::from("admin-jwt"))
            .await
            .unwrap();
        assert!(url.starts_with(&format!(
            "{}/storage/v1/object/public/product-templates/",
            server.url()
        )));
        assert!(url.ends_with("-kit.zip"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_zip_rejected_before_request() {
        let server = mockito::Server::new_async().await;
        let err = client(&server)
            .upload_template("kit.exe", vec![1], &SecretString::from("jwt"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidUpload(_)));
    }
}
