//! Errors returned by the hosted backend clients.

use serde::Deserialize;
use thiserror::Error;

/// Error codes the relational API uses for a table that does not exist.
const MISSING_TABLE_CODES: &[&str] = &["42P01", "PGRST205", "PGRST116"];

/// Codes that can only mean the table itself is absent.
const UNDEFINED_TABLE_CODES: &[&str] = &["42P01", "PGRST205"];

/// Message fragments that indicate a missing table.
const MISSING_TABLE_FRAGMENTS: &[&str] = &["relation", "does not exist", "500"];

/// Errors that can occur when calling the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// JSON parsing failed.
    #[error("Unexpected response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A single-row lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A serverless function answered `{error}`.
    #[error("{0}")]
    Function(String),

    /// Rejected locally before calling storage.
    #[error("{0}")]
    InvalidUpload(String),

    /// URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// Whether this error means the queried table is absent.
    ///
    /// Transport failures count as missing too, so an unreachable side table
    /// is treated as unavailable rather than retried.
    #[must_use]
    pub fn is_missing_table(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { code, message, .. } => {
                code.as_deref()
                    .is_some_and(|c| MISSING_TABLE_CODES.contains(&c))
                    || MISSING_TABLE_FRAGMENTS
                        .iter()
                        .any(|fragment| message.contains(fragment))
            }
            _ => false,
        }
    }

    /// Whether the service definitely reported the table as absent.
    ///
    /// Narrower than [`Self::is_missing_table`]: transport failures and
    /// server errors do not count, since they say nothing lasting about the
    /// schema.
    #[must_use]
    pub fn is_undefined_table(&self) -> bool {
        matches!(
            self,
            Self::Api { code: Some(code), .. } if UNDEFINED_TABLE_CODES.contains(&code.as_str())
        )
    }

    /// Whether the service rejected the caller's credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }

    /// Build an `Api` error from a non-success response body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(ErrorBody::code);
        let message = parsed
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| {
                let snippet: String = body.chars().take(200).collect();
                if snippet.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {snippet}")
                }
            });
        Self::Api {
            status,
            code,
            message,
        }
    }
}

/// Union of the error shapes returned by the REST, auth, storage and
/// function endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.error_code.clone(),
        }
    }

    fn into_message(self) -> Option<String> {
        let error = self.error.and_then(|e| match e {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        });
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(error)
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: Option<&str>, message: &str) -> BackendError {
        BackendError::Api {
            status: 404,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_missing_table_codes() {
        assert!(api(Some("42P01"), "").is_missing_table());
        assert!(api(Some("PGRST205"), "").is_missing_table());
        assert!(api(Some("PGRST116"), "").is_missing_table());
        assert!(!api(Some("23505"), "duplicate key").is_missing_table());
    }

    #[test]
    fn test_undefined_table_is_code_only() {
        assert!(api(Some("42P01"), "").is_undefined_table());
        assert!(api(Some("PGRST205"), "").is_undefined_table());
        assert!(!api(Some("PGRST116"), "").is_undefined_table());
        assert!(!api(None, "HTTP 500").is_undefined_table());
        assert!(!BackendError::from_response(500, "upstream timeout").is_undefined_table());
    }

    #[test]
    fn test_missing_table_messages() {
        assert!(api(None, "relation \"public.Account\" does not exist").is_missing_table());
        assert!(api(None, "HTTP 500").is_missing_table());
        assert!(!api(None, "permission denied for table Account").is_missing_table());
        assert!(!BackendError::NotFound("x".into()).is_missing_table());
    }

    #[test]
    fn test_from_response_rest_shape() {
        let err = BackendError::from_response(
            404,
            r#"{"code":"PGRST205","details":null,"hint":null,"message":"Could not find the table 'public.Account' in the schema cache"}"#,
        );
        assert!(err.is_missing_table());
        assert!(err.to_string().starts_with("Could not find the table"));
    }

    #[test]
    fn test_from_response_auth_shapes() {
        let err = BackendError::from_response(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Invalid login credentials");

        let err = BackendError::from_response(422, r#"{"code":422,"msg":"Password should be at least 6 characters"}"#);
        assert_eq!(err.to_string(), "Password should be at least 6 characters");
    }

    #[test]
    fn test_from_response_plain_text() {
        let err = BackendError::from_response(502, "Bad Gateway");
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
        assert!(!err.is_missing_table());
    }
}
