//! OpenRouter text completion adapter (OpenAI-style chat completions).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::traits::{ChatOptions, ChatOutput, TextCompletion};

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

const INPUT_COST_PER_TOKEN: f64 = 0.10 / 1_000_000.0;
const OUTPUT_COST_PER_TOKEN: f64 = 0.40 / 1_000_000.0;

/// OpenRouter chat completions client.
pub struct OpenRouterText {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

impl OpenRouterText {
    /// Create a client from a credential.
    pub fn new(credential: &Credential, model_override: Option<&str>) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            endpoint: credential
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: credential
                .model
                .clone()
                .or_else(|| model_override.map(str::to_string))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: credential.token.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl TextCompletion for OpenRouterText {
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> ProviderResult<ChatOutput> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            response_format: options.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
        };

        debug!(model = %self.model, "Calling OpenRouter chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("OpenRouter response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::invalid_response("No choices in OpenRouter response"))?;

        let usage = parsed.usage;
        Ok(ChatOutput {
            content,
            input_tokens: usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        input_tokens as f64 * INPUT_COST_PER_TOKEN + output_tokens as f64 * OUTPUT_COST_PER_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let client = OpenRouterText::new(&Credential::token_only("k"), None).unwrap();
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_model_override_precedence() {
        // Credential model beats the config override
        let credential = Credential {
            endpoint: None,
            token: "k".to_string(),
            model: Some("anthropic/claude-sonnet".to_string()),
            quality: None,
            extra: None,
        };
        let client = OpenRouterText::new(&credential, Some("config/model")).unwrap();
        assert_eq!(client.model, "anthropic/claude-sonnet");
    }
}
