use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::errors::ProviderError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String, // "system", "user" or "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Something that answers a chat conversation with SQL text.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Returns the raw text of the first completion.
    async fn generate_sql(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

// Every level is optional so a malformed payload becomes an
// InvalidResponse instead of a generic decode failure.
#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<Choice>>,
}

fn first_choice_content(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("Respuesta inválida del API".to_string()))
}

/// OpenAI-compatible chat-completions client (Perplexity by default).
pub struct ChatCompletionClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl SqlGenerator for ChatCompletionClient {
    async fn generate_sql(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        log::debug!("[LLM] completion received from {}", self.config.model);

        first_choice_content(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, ProviderError> {
        first_choice_content(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_first_choice_content() {
        let content = parse(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"SELECT 1"}},{"message":{"content":"SELECT 2"}}]}"#,
        )
        .unwrap();
        assert_eq!(content, "SELECT 1");
    }

    #[test]
    fn test_missing_fields_are_invalid_response() {
        for json in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{"finish_reason":"length"}]}"#,
            r#"{"choices":[{"message":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"message":{"content":"  "}}]}"#,
        ] {
            assert!(
                matches!(parse(json), Err(ProviderError::InvalidResponse(_))),
                "expected invalid response for {}",
                json
            );
        }
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionRequest {
            model: "mixtral-8x7b-instruct",
            messages: &messages,
            temperature: 0.1,
            max_tokens: 150,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "mixtral-8x7b-instruct");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = ChatCompletionClient::new(LlmConfig {
            // unroutable; a network attempt would surface as RequestFailed
            endpoint: "http://127.0.0.1:9/chat/completions".to_string(),
            api_key: None,
            ..LlmConfig::default()
        })
        .unwrap();

        let result = client.generate_sql(&[ChatMessage::user("palabras con q")]).await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }
}
