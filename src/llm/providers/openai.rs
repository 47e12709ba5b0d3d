//! OpenAI API Provider
//!
//! This module implements the LLMProvider trait for OpenAI-compatible chat
//! completion endpoints.

use crate::error::{Result, SqlChatError};
use crate::llm::client::LLMHttpClient;
use crate::llm::provider::{GenerationParams, LLMProvider, LLMResponse, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const PROVIDER_NAME: &str = "OpenAI";

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    /// API key for authentication
    api_key: String,
    /// Model to use (e.g., "gpt-4o-mini")
    model: String,
    /// Base URL, without the `/chat/completions` suffix
    base_url: String,
    /// HTTP client for making requests
    client: LLMHttpClient,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model identifier
    /// * `base_url` - API root such as `https://api.openai.com/v1`
    /// * `timeout` - Bound on each request
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: LLMHttpClient::with_timeout(PROVIDER_NAME, timeout)?,
        })
    }

    /// Full URL of the chat completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, messages: &[Message], params: &GenerationParams) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|msg| OpenAIMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

/// Parse a chat completions response body
fn parse_response(body: &str) -> Result<LLMResponse> {
    let response: OpenAIResponse =
        serde_json::from_str(body).map_err(|e| SqlChatError::LlmApi {
            provider: PROVIDER_NAME.to_string(),
            message: format!("Failed to parse response: {}", e),
            status: 0,
        })?;

    let choice = response.choices.first().ok_or_else(|| SqlChatError::LlmApi {
        provider: PROVIDER_NAME.to_string(),
        message: "Response contained no choices".to_string(),
        status: 0,
    })?;

    Ok(LLMResponse {
        content: choice.message.content.clone().unwrap_or_default(),
        model: response.model.clone(),
        input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
        output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
        total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
        finish_reason: choice.finish_reason.clone(),
    })
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate(
        &self,
        messages: &[Message],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse> {
        self.validate_config()?;

        let defaults = GenerationParams::default();
        let request = self.build_request(messages, params.unwrap_or(&defaults));
        let headers = LLMHttpClient::build_headers(&self.api_key)?;

        debug!(model = %self.model, messages = messages.len(), "calling chat completions");
        let body = self.client.post_json(&self.endpoint(), headers, &request).await?;
        let response = parse_response(&body)?;
        debug!(tokens = ?response.get_total_tokens(), "chat completion received");
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// OpenAI API message format
#[derive(Debug, Serialize, Clone)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: OpenAIMessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(key: &str) -> OpenAIProvider {
        OpenAIProvider::new(key, "gpt-4o-mini", "http://localhost:9/v1/", Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        assert_eq!(provider("k").endpoint(), "http://localhost:9/v1/chat/completions");

        let default = OpenAIProvider::new(
            "k",
            "gpt-4o",
            crate::config::DEFAULT_API_BASE_URL,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(default.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let provider = provider("k");
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];

        let request = provider.build_request(&messages, &GenerationParams::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 2500);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert!((json["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "```sql\nSELECT 1;\n```"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        }"#;

        let response = parse_response(body).unwrap();
        assert_eq!(response.content, "```sql\nSELECT 1;\n```");
        assert_eq!(response.total_tokens, Some(20));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, SqlChatError::LlmApi { .. }));

        let err = parse_response("not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse response"));
    }

    #[test]
    fn test_has_api_key() {
        assert!(provider("test-key").has_api_key());
        assert!(!provider("").has_api_key());
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let err = provider("").generate(&[Message::user("hi")], None).await.unwrap_err();
        assert!(matches!(err, SqlChatError::LlmApiKeyMissing(_)));
    }
}
