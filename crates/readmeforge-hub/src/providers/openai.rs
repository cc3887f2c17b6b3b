//! OpenAI-compatible provider: the rotation adapter used by the credential
//! pool (Groq by default; any chat-completions endpoint works).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use readmeforge_core::error::{ForgeError, Result};
use readmeforge_core::message::{ChatMessage, LlmResponse, TokenUsage};
use readmeforge_core::provider::{ChatRequest, LlmProvider, ProviderConfig};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible provider.
///
/// The credential and model normally arrive with each request; the values
/// in `ProviderConfig` are only used when a request leaves them unset.
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
    api_url: String,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let api_url = format!("{}/chat/completions", api_base.trim_end_matches('/'));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            api_url,
        }
    }

    /// Create a provider for Groq (OpenAI-compatible endpoint).
    pub fn groq(model: &str) -> Self {
        Self::new(ProviderConfig {
            provider: "groq".to_string(),
            model: model.to_string(),
            api_key: None,
            api_base: Some(GROQ_API_BASE.to_string()),
            ..Default::default()
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// Internal request body.
#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// Internal response body.
#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    model: Option<String>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<LlmResponse> {
        let model = request
            .model
            .unwrap_or_else(|| self.config.model.clone());

        let api_key = request
            .api_key
            .or_else(|| self.config.api_key.clone())
            .ok_or_else(|| {
                ForgeError::Provider(format!("{}: no API key supplied", self.config.provider))
            })?;

        info!("Calling {} model: {}", self.config.provider, model);

        let body = ApiRequest {
            model: &model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await?;

        debug!("API response status: {}, body length: {}", status, body_text.len());

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&body_text) {
                return Err(ForgeError::Provider(format!(
                    "{} API error ({}): {}",
                    self.config.provider, status, err.error.message
                )));
            }
            return Err(ForgeError::Provider(format!(
                "{} API error ({}): {}",
                self.config.provider,
                status,
                truncate(&body_text, 200)
            )));
        }

        let api_resp: ApiResponse = serde_json::from_str(&body_text).map_err(|e| {
            ForgeError::Provider(format!(
                "Failed to parse response: {}, body: {}",
                e,
                truncate(&body_text, 200)
            ))
        })?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::Provider("No choices in response".to_string()))?;

        let usage = api_resp
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_resp.model.unwrap_or(model),
            usage,
        })
    }
}

/// Truncate on a char boundary.
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
