//! HTTP utilities for Azure Resource Manager calls

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Default per-request read timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Supported HTTP verbs. Anything else is unrepresentable, so an unsupported
/// method is rejected at compile time rather than before the network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Patch,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Request body modes, mutually exclusive by construction.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub enum RequestBody {
    #[default]
    None,
    Raw(String),
    Form(Vec<(String, String)>),
}

/// Errors from the ARM request/response layer.
///
/// A 400 is kept distinct from other failures: it signals that this tool
/// built a malformed request, not that Azure is misbehaving.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{api} API rejected the request (code: 400). Either required headers are missing or the body of the JSON is malformed. Response: {body}")]
    BadRequest { api: String, body: String },

    #[error("error accessing {api} API (code: {status}). Response: {body}")]
    Upstream { api: String, status: u16, body: String },

    #[error("error reaching {api} API: {source}")]
    Transport {
        api: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{api} API returned a body that is not valid JSON: {source}")]
    Decode {
        api: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A raw HTTP response, before interpretation.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP client wrapper for Azure API calls
#[derive(Clone)]
pub struct AzureHttpClient {
    client: Client,
}

impl AzureHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("aztidal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Execute a request and return the raw response.
    ///
    /// Query parameters are appended with standard URL encoding. The bearer
    /// token goes into the Authorization header. No retries, no redirect
    /// handling beyond what reqwest does on its own.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        token: &str,
        body: RequestBody,
        timeout: Option<Duration>,
    ) -> Result<RawResponse, ApiError> {
        tracing::debug!("{:?} {}", method, url);

        let mut request = self
            .client
            .request(method.as_reqwest(), url)
            .bearer_auth(token)
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));

        if !query.is_empty() {
            request = request.query(query);
        }

        request = match body {
            RequestBody::None => request,
            RequestBody::Raw(raw) => request.body(raw),
            RequestBody::Form(fields) => request.form(&fields),
        };

        let response = request.send().await.map_err(|source| ApiError::Transport {
            api: url.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                api: url.to_string(),
                source,
            })?;

        Ok(RawResponse { status, body })
    }
}

/// Classify a raw response: success with a parsed JSON body, a 400 signalling
/// malformed request construction, or a generic upstream failure.
///
/// A successful response with an empty body becomes `Value::Bool(true)`.
pub fn interpret(api_name: &str, response: RawResponse) -> Result<Value, ApiError> {
    match response.status {
        200 | 202 | 204 => {
            if response.body.is_empty() {
                Ok(Value::Bool(true))
            } else {
                serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
                    api: api_name.to_string(),
                    source,
                })
            }
        }
        400 => {
            tracing::error!(
                "{} API returned 400: {}",
                api_name,
                sanitize_for_log(&response.body)
            );
            Err(ApiError::BadRequest {
                api: api_name.to_string(),
                body: response.body,
            })
        }
        status => {
            tracing::error!(
                "{} API returned {}: {}",
                api_name,
                status,
                sanitize_for_log(&response.body)
            );
            Err(ApiError::Upstream {
                api: api_name.to_string(),
                status,
                body: response.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn success_with_body_parses_json() {
        let value = interpret("Test", raw(200, r#"{"value": []}"#)).unwrap();
        assert!(value.get("value").is_some());
    }

    #[test]
    fn success_with_empty_body_is_true() {
        let value = interpret("Test", raw(204, "")).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn accepted_is_success() {
        let value = interpret("Test", raw(202, r#"{"status": "pending"}"#)).unwrap();
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn bad_request_is_distinguished() {
        let err = interpret("Test", raw(400, "missing header")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn other_failures_are_upstream_errors() {
        for status in [401, 403, 404, 429, 500, 503] {
            let err = interpret("Test", raw(status, "nope")).unwrap_err();
            match err {
                ApiError::Upstream { status: got, .. } => assert_eq!(got, status),
                other => panic!("expected Upstream for {}, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn success_with_invalid_json_is_decode_error() {
        let err = interpret("Test", raw(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
        assert!(sanitized.len() < body.len());
    }
}
