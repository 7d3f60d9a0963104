use crate::errors::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Anything that turns a message list into one assistant reply
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ServiceError> {
        if config.api_key.trim().is_empty() {
            return Err(ServiceError::ServiceUnavailable(
                "OpenAI API key is not configured".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatCompletionProvider for OpenAiClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ServiceError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, messages = messages.len(), "requesting chat completion");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "chat completion request failed");
                ServiceError::ExternalServiceError(format!("LLM request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %text, "chat completion returned an error");
            return Err(ServiceError::ExternalServiceError(format!(
                "LLM provider returned {}",
                status
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid LLM response: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ServiceError::ExternalServiceError("LLM returned no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig {
            api_key: "sk-test".into(),
            base_url,
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Two loaves left." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(server.uri())
            .complete(vec![ChatMessage::user("how much bread?")])
            .await
            .unwrap();
        assert_eq!(reply, "Two loaves left.");
    }

    #[tokio::test]
    async fn error_status_is_a_gateway_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let result = client(server.uri())
            .complete(vec![ChatMessage::user("hi")])
            .await;
        assert_matches!(result, Err(ServiceError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn empty_choices_are_a_gateway_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let result = client(format!("{}/", server.uri()))
            .complete(vec![ChatMessage::user("hi")])
            .await;
        assert_matches!(result, Err(ServiceError::ExternalServiceError(_)));
    }

    #[test]
    fn blank_key_is_rejected() {
        let result = OpenAiClient::new(OpenAiConfig {
            api_key: "  ".into(),
            base_url: "http://localhost".into(),
            model: "m".into(),
            temperature: 0.0,
            timeout: Duration::from_secs(1),
        });
        assert_matches!(result, Err(ServiceError::ServiceUnavailable(_)));
    }
}
