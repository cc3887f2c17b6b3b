//! Google Gemini provider: native `generateContent` REST API.
//!
//! Used as the preferred provider: one key, one model, no rotation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use readmeforge_core::error::{ForgeError, Result};
use readmeforge_core::message::{ChatMessage, LlmResponse, Role, TokenUsage};
use readmeforge_core::provider::{ChatRequest, LlmProvider, ProviderConfig};

use super::openai::truncate;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config,
            api_base,
        }
    }

    pub fn gemini(api_key: &str, model: &str) -> Self {
        Self::new(ProviderConfig {
            provider: "gemini".to_string(),
            model: model.to_string(),
            api_key: Some(api_key.to_string()),
            api_base: None,
            ..Default::default()
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Serialize, Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    /// Flattened text some proxies return instead of candidates.
    text: Option<String>,
    usage_metadata: Option<ApiUsage>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn to_api_request(request: &ChatRequest) -> ApiRequest {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let system_instruction = (!system.is_empty()).then(|| ApiContent {
        role: None,
        parts: vec![ApiPart {
            text: Some(system.join("\n\n")),
        }],
    });

    let contents = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m: &ChatMessage| ApiContent {
            role: Some(match m.role {
                Role::Assistant => "model".to_string(),
                _ => "user".to_string(),
            }),
            parts: vec![ApiPart {
                text: Some(m.content.clone()),
            }],
        })
        .collect();

    ApiRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

/// Concatenate candidate parts; fall back to a plain `text` field.
fn extract_text(resp: &ApiResponse) -> Option<String> {
    let parts = resp
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .filter(|text| !text.is_empty());

    parts.or_else(|| resp.text.clone())
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<LlmResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        let api_key = request
            .api_key
            .clone()
            .or_else(|| self.config.api_key.clone())
            .ok_or_else(|| {
                ForgeError::Provider(format!("{}: no API key supplied", self.config.provider))
            })?;

        info!("Calling {} model: {}", self.config.provider, model);

        let resp = self
            .client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", api_key)
            .json(&to_api_request(&request))
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await?;

        debug!("API response status: {}, body length: {}", status, body_text.len());

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body_text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate(&body_text, 200).to_string());
            return Err(ForgeError::Provider(format!(
                "{} API error ({}): {}",
                self.config.provider, status, detail
            )));
        }

        let api_resp: ApiResponse = serde_json::from_str(&body_text)?;

        let content = extract_text(&api_resp).ok_or_else(|| {
            ForgeError::Provider(format!("{}: response contained no text", self.config.provider))
        })?;

        let usage = api_resp
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: api_resp.model_version.unwrap_or(model),
            usage,
        })
    }
}
