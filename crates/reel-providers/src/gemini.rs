//! Gemini text completion adapter.
//!
//! Talks to Google's generateContent API. The system and user prompts are
//! combined into a single content part; JSON output is requested via the
//! response MIME type.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::traits::{ChatOptions, ChatOutput, TextCompletion};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// Published per-1M-token pricing for the default model tier.
const INPUT_COST_PER_TOKEN: f64 = 0.075 / 1_000_000.0;
const OUTPUT_COST_PER_TOKEN: f64 = 0.30 / 1_000_000.0;

/// Gemini API client.
pub struct GeminiText {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "temperature", skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}

impl GeminiText {
    /// Create a client from a credential. Endpoint and model overrides come
    /// from the credential, with service defaults otherwise.
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
impl TextCompletion for GeminiText {
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> ProviderResult<ChatOutput> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{}\n\n{}", system_prompt, user_prompt),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: options
                    .json_output
                    .then(|| "application/json".to_string()),
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        debug!(model = %self.model, "Calling Gemini generateContent");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("Gemini response: {}", e)))?;

        let content = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| ProviderError::invalid_response("No content in Gemini response"))?;

        let usage = parsed.usage_metadata;
        Ok(ChatOutput {
            content,
            input_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
            output_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
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
    fn test_cost_estimate_scales_with_tokens() {
        let client = GeminiText::new(&Credential::token_only("k"), None).unwrap();
        let small = client.estimate_cost(1000, 1000);
        let large = client.estimate_cost(2000, 2000);
        assert!(large > small);
        assert!((large - 2.0 * small).abs() < 1e-12);
    }

    #[test]
    fn test_credential_overrides_apply() {
        let credential = Credential {
            endpoint: Some("https://proxy.internal/v1beta".to_string()),
            token: "k".to_string(),
            model: Some("gemini-2.5-pro".to_string()),
            quality: None,
            extra: None,
        };
        let client = GeminiText::new(&credential, Some("ignored")).unwrap();
        assert_eq!(client.endpoint, "https://proxy.internal/v1beta");
        assert_eq!(client.model, "gemini-2.5-pro");
    }
}
