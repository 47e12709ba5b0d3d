//! LLM HTTP Client
//!
//! This module provides the HTTP client used for completion requests. Every
//! request is bounded by the configured API timeout. Failures are returned
//! to the caller as-is; the operator decides whether to retry.

use crate::error::{Result, SqlChatError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Longest error body kept in error messages
const MAX_ERROR_BODY: usize = 500;

/// HTTP client for LLM API requests
#[derive(Clone)]
pub struct LLMHttpClient {
    /// Reqwest HTTP client
    client: Client,
    /// Request timeout
    timeout: Duration,
    /// Provider name used in error messages
    provider: String,
}

impl LLMHttpClient {
    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(provider: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            timeout,
            provider: provider.into(),
        })
    }

    /// POST a JSON body and return the response text
    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<String> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if status.is_success() {
            return Ok(text);
        }

        Err(SqlChatError::LlmApi {
            provider: self.provider.clone(),
            message: error_message(&text),
            status: status.as_u16(),
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SqlChatError {
        if err.is_timeout() {
            SqlChatError::ApiTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SqlChatError::Http(err)
        }
    }

    /// Build standard headers for API requests
    pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SqlChatError::Config("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }
}

/// Pull the human-readable message out of an API error body
///
/// OpenAI-style bodies look like `{"error": {"message": "..."}}`; anything
/// else is returned truncated.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_with_timeout() {
        let client = LLMHttpClient::with_timeout("OpenAI", Duration::from_millis(1500)).unwrap();
        assert_eq!(client.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_headers_building() {
        let headers = LLMHttpClient::build_headers("test-key").unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer test-key");
    }

    #[test]
    fn test_headers_reject_newline_key() {
        assert!(LLMHttpClient::build_headers("bad\nkey").is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "Incorrect API key provided",
            "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
