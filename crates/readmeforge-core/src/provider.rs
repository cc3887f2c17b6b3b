//! LLM Provider trait: the abstraction over different AI model APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{ChatMessage, LlmResponse};
use crate::retry::RequestOptions;

/// A single chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Model override (None = provider default).
    pub model: Option<String>,
    /// Credential override (None = provider's configured key).
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            model: None,
            api_key: None,
            max_tokens: 2048,
            temperature: 0.2,
        }
    }
}

/// LLM Provider trait: implement this to add support for new AI providers.
///
/// Implementations perform exactly one network call per `chat` and must not
/// retry internally. Errors carry the provider's message verbatim so the
/// fallback controller can classify them.
///
/// # Example
///
/// ```rust,ignore
/// struct MyProvider;
///
/// #[async_trait]
/// impl LlmProvider for MyProvider {
///     fn name(&self) -> &str { "my-provider" }
///     fn default_model(&self) -> &str { "my-model-v1" }
///
///     async fn chat(&self, request: ChatRequest) -> Result<LlmResponse> {
///         // Call your API here
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "groq", "gemini").
    fn name(&self) -> &str;

    /// Default model for this provider.
    fn default_model(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<LlmResponse>;
}

/// Anything that can turn a conversation into completion text.
///
/// The fallback controller implements this; pipeline stages depend on it so
/// they can be driven by scripted doubles in tests.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<String>;
}

/// Connection settings for a single HTTP provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}
