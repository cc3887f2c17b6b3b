//! Fallback controller: resilient completions over a rotating pool of
//! credentials and models, with an optional preferred provider in front.
//!
//! Flow for one `make_request`:
//! 1. If a preferred provider is configured and still enabled, try it once.
//!    Any failure disables it for the controller's lifetime.
//! 2. Otherwise loop up to `max_retries` times against the rotation
//!    provider with the active credential and model. Each failure is
//!    classified, the pool is penalized/rotated accordingly, and the task
//!    sleeps for a capped, jittered exponential backoff.
//! 3. Only exhaustion surfaces as an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use readmeforge_core::classify::{Classifier, RecoveryAction};
use readmeforge_core::config::ForgeConfig;
use readmeforge_core::error::{ForgeError, Result};
use readmeforge_core::message::ChatMessage;
use readmeforge_core::pool::{CredentialPool, ModelRoster};
use readmeforge_core::provider::{ChatRequest, Completer, LlmProvider, ProviderConfig};
use readmeforge_core::retry::{AttemptOutcome, Backoff, RequestAttempt, RequestOptions};

use super::openai::GROQ_API_BASE;
use super::{GeminiProvider, OpenAiProvider};
use crate::metrics::{SharedMetrics, new_metrics};

/// Mutable rotation state. Locked only around index/cooldown updates,
/// never across a network call or a sleep.
struct PoolState {
    credentials: CredentialPool,
    models: ModelRoster,
}

/// Point-in-time view of the pool, for logs and tests.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub credential_index: usize,
    pub model_index: usize,
    pub model: String,
    pub cooldowns: Vec<Option<DateTime<Utc>>>,
}

enum PreferredOutcome {
    Skipped,
    Answered(String),
    Failed(String),
}

pub struct FallbackController {
    preferred: Option<Box<dyn LlmProvider>>,
    preferred_disabled: AtomicBool,
    rotation: Box<dyn LlmProvider>,
    pool: Option<Mutex<PoolState>>,
    classifier: Classifier,
    backoff: Backoff,
    metrics: SharedMetrics,
}

impl FallbackController {
    /// Fails with `NoUsableBackend` when neither a preferred provider nor
    /// any credential is available.
    pub fn new(
        preferred: Option<Box<dyn LlmProvider>>,
        rotation: Box<dyn LlmProvider>,
        credentials: Option<CredentialPool>,
        models: ModelRoster,
        classifier: Classifier,
        backoff: Backoff,
    ) -> Result<Self> {
        if preferred.is_none() && credentials.is_none() {
            return Err(ForgeError::NoUsableBackend(format!(
                "no {} API keys found and no preferred provider configured",
                rotation.name()
            )));
        }

        if let Some(p) = &preferred {
            info!("Preferred provider: {} ({})", p.name(), p.default_model());
        }
        if let Some(c) = &credentials {
            info!(
                "Credential pool: {} key(s) for {}, {} model(s) in roster",
                c.len(),
                rotation.name(),
                models.len()
            );
        }

        Ok(Self {
            preferred,
            preferred_disabled: AtomicBool::new(false),
            rotation,
            pool: credentials.map(|credentials| Mutex::new(PoolState { credentials, models })),
            classifier,
            backoff,
            metrics: new_metrics(),
        })
    }

    /// Build from config, reading secrets from the process environment.
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    pub fn from_config_with<F>(config: &ForgeConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let models = config.model_roster()?;
        let credentials = config.credential_pool(&lookup);

        let preferred = config.resolve_preferred_key(&lookup).map(|key| {
            Box::new(GeminiProvider::new(ProviderConfig {
                provider: "gemini".to_string(),
                model: config.preferred.model.clone(),
                api_key: Some(key),
                api_base: config.preferred.api_base.clone(),
                timeout_secs: config.retry.timeout_secs,
            })) as Box<dyn LlmProvider>
        });

        let rotation = OpenAiProvider::new(ProviderConfig {
            provider: config.pool.provider.clone(),
            model: models.current().to_string(),
            api_key: None,
            api_base: Some(
                config
                    .pool
                    .api_base
                    .clone()
                    .unwrap_or_else(|| GROQ_API_BASE.to_string()),
            ),
            timeout_secs: config.retry.timeout_secs,
        });

        Self::new(
            preferred,
            Box::new(rotation),
            credentials,
            models,
            config.classifier(),
            config.backoff(),
        )
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// True while the preferred provider exists and has not failed.
    pub fn preferred_active(&self) -> bool {
        self.preferred.is_some() && !self.preferred_disabled.load(Ordering::SeqCst)
    }

    pub async fn pool_snapshot(&self) -> Option<PoolSnapshot> {
        let state = self.pool.as_ref()?.lock().await;
        Some(PoolSnapshot {
            credential_index: state.credentials.current_index(),
            model_index: state.models.current_index(),
            model: state.models.current().to_string(),
            cooldowns: (0..state.credentials.len())
                .map(|i| state.credentials.cooldown_until(i))
                .collect(),
        })
    }

    /// Generate a completion, absorbing every recoverable failure.
    pub async fn make_request(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<String> {
        let preferred_error = match self.try_preferred(messages, options).await {
            PreferredOutcome::Answered(text) => {
                self.metrics.record_request(true);
                return Ok(text);
            }
            PreferredOutcome::Failed(message) => Some(message),
            PreferredOutcome::Skipped => None,
        };

        let Some(pool) = &self.pool else {
            self.metrics.record_request(false);
            return Err(ForgeError::ExhaustedRetries {
                attempts: 0,
                last_error: preferred_error
                    .unwrap_or_else(|| "no credential pool configured".to_string()),
            });
        };

        let result = self.run_pool(pool, messages, options).await;
        self.metrics.record_request(result.is_ok());
        result
    }

    async fn try_preferred(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> PreferredOutcome {
        let Some(provider) = &self.preferred else {
            return PreferredOutcome::Skipped;
        };
        if self.preferred_disabled.load(Ordering::SeqCst) {
            return PreferredOutcome::Skipped;
        }

        let request = ChatRequest {
            messages: messages.to_vec(),
            model: None,
            api_key: None,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        match provider.chat(request).await {
            Ok(resp) => {
                self.metrics.record_preferred(true);
                self.metrics.record_tokens(resp.usage.total_tokens);
                info!(
                    provider = provider.name(),
                    tokens = resp.usage.total_tokens,
                    "Preferred provider answered"
                );
                PreferredOutcome::Answered(resp.content)
            }
            Err(e) => {
                self.preferred_disabled.store(true, Ordering::SeqCst);
                self.metrics.record_preferred(false);
                warn!(
                    provider = provider.name(),
                    error = %e,
                    "Preferred provider failed; using {} pool from now on",
                    self.rotation.name()
                );
                PreferredOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_pool(
        &self,
        pool: &Mutex<PoolState>,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<String> {
        let mut last_error = String::from("no attempts were made");

        for attempt in 0..options.max_retries {
            let (credential_index, credential, masked, model_index, model) = {
                let state = pool.lock().await;
                let idx = state.credentials.current_index();
                (
                    idx,
                    state.credentials.current().to_string(),
                    state.credentials.masked(idx),
                    state.models.current_index(),
                    state.models.current().to_string(),
                )
            };

            info!(
                attempt = attempt + 1,
                credential = %masked,
                model = %model,
                "Attempt {}: key #{}, model: {}",
                attempt + 1,
                credential_index + 1,
                model
            );

            let request = ChatRequest {
                messages: messages.to_vec(),
                model: Some(model.clone()),
                api_key: Some(credential),
                max_tokens: options.max_tokens,
                temperature: options.temperature,
            };

            let outcome = match self.rotation.chat(request).await {
                Ok(resp) => {
                    self.metrics.record_tokens(resp.usage.total_tokens);
                    let tokens = resp.usage.total_tokens;
                    info!(tokens, "Success. Tokens used: {}", tokens);
                    AttemptOutcome::Success(resp.content)
                }
                Err(e) => {
                    let message = e.to_string();
                    let classification = self.classifier.classify(&message);
                    self.recover(pool, credential_index, model_index, classification.action)
                        .await;
                    last_error = message.clone();
                    AttemptOutcome::Failure {
                        kind: classification.kind,
                        message,
                    }
                }
            };

            let is_last = attempt + 1 == options.max_retries;
            let delay = match &outcome {
                AttemptOutcome::Failure { .. } if !is_last => self.backoff.delay(attempt),
                _ => Duration::ZERO,
            };

            let record = RequestAttempt {
                attempt,
                credential_index,
                model,
                delay,
                outcome,
            };
            self.metrics.record_attempt(record.succeeded());

            if let AttemptOutcome::Success(text) = record.outcome {
                return Ok(text);
            }

            warn!(delay_ms = delay.as_millis() as u64, "{}", record);

            if !delay.is_zero() {
                debug!("Retrying after {:.1}s...", delay.as_secs_f64());
                self.metrics.record_sleep();
                tokio::time::sleep(delay).await;
            }
        }

        warn!("All {} retries failed", options.max_retries);
        Err(ForgeError::ExhaustedRetries {
            attempts: options.max_retries,
            last_error,
        })
    }

    /// Apply a recovery action to the credential/model that just failed.
    ///
    /// Rotation only happens if the failed index is still the active one,
    /// so a concurrent caller that already rotated is not rotated again.
    async fn recover(
        &self,
        pool: &Mutex<PoolState>,
        credential_index: usize,
        model_index: usize,
        action: RecoveryAction,
    ) {
        let mut state = pool.lock().await;

        if let Some(cooldown) = action.cooldown() {
            state.credentials.mark_on_cooldown(credential_index, cooldown);
            self.metrics.record_cooldown();
            info!("Key #{} on cooldown for {}s", credential_index + 1, cooldown.as_secs());
        }

        if action.rotates_credential() && state.credentials.current_index() == credential_index {
            let next = state.credentials.rotate();
            self.metrics.record_credential_rotation();
            if next == credential_index {
                warn!("No other API key available; reusing key #{}", next + 1);
            } else {
                info!("Switched to API key #{}", next + 1);
            }
        }

        if action.rotates_model() && state.models.current_index() == model_index {
            state.models.rotate();
            self.metrics.record_model_rotation();
            info!("Switched to model: {}", state.models.current());
        }
    }
}

#[async_trait]
impl Completer for FallbackController {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<String> {
        self.make_request(messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readmeforge_core::classify::{FailureKind, default_rules};
    use readmeforge_core::message::{LlmResponse, TokenUsage};
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crate::metrics::Metrics;

    #[derive(Debug, Clone)]
    struct Call {
        api_key: Option<String>,
        model: Option<String>,
    }

    /// Provider double that replays a script, then repeats `fallback`.
    #[derive(Clone)]
    struct ScriptedProvider {
        name: String,
        script: Arc<std::sync::Mutex<VecDeque<std::result::Result<String, String>>>>,
        fallback: std::result::Result<String, String>,
        calls: Arc<std::sync::Mutex<Vec<Call>>>,
    }

    impl ScriptedProvider {
        fn new(name: &str, script: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                name: name.to_string(),
                script: Arc::new(std::sync::Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                )),
                fallback: Err("script exhausted".to_string()),
                calls: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }

        fn failing_forever(name: &str, message: &str) -> Self {
            let mut p = Self::new(name, vec![]);
            p.fallback = Err(message.to_string());
            p
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> Result<LlmResponse> {
            self.calls.lock().unwrap().push(Call {
                api_key: request.api_key.clone(),
                model: request.model.clone(),
            });
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match next {
                Ok(content) => Ok(LlmResponse {
                    content,
                    model: request.model.unwrap_or_default(),
                    usage: TokenUsage {
                        total_tokens: 3,
                        ..Default::default()
                    },
                }),
                Err(message) => Err(ForgeError::Provider(message)),
            }
        }
    }

    fn controller(
        preferred: Option<&ScriptedProvider>,
        rotation: &ScriptedProvider,
        keys: &[&str],
    ) -> FallbackController {
        FallbackController::new(
            preferred.map(|p| Box::new(p.clone()) as Box<dyn LlmProvider>),
            Box::new(rotation.clone()),
            CredentialPool::new(keys.iter().copied()),
            ModelRoster::new(["model-a", "model-b"]).unwrap(),
            Classifier::default(),
            Backoff::default(),
        )
        .unwrap()
    }

    fn hello() -> Vec<ChatMessage> {
        vec![ChatMessage::user("Hello, please respond with 'OK'")]
    }

    fn assert_cooldown_about(until: Option<DateTime<Utc>>, secs: i64) {
        let until = until.expect("credential should be on cooldown");
        let expected = Utc::now() + chrono::Duration::seconds(secs);
        let drift = (until - expected).num_seconds().abs();
        assert!(drift <= 5, "cooldown off by {drift}s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_try_success_no_rotation_no_sleep() {
        let rotation = ScriptedProvider::new("groq", vec![Ok("OK")]);
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        let text = c
            .make_request(&hello(), RequestOptions::default().with_max_tokens(10))
            .await
            .unwrap();

        assert_eq!(text, "OK");
        assert_eq!(rotation.calls().len(), 1);
        assert_eq!(Metrics::get(&c.metrics().backoff_sleeps), 0);
        let snap = c.pool_snapshot().await.unwrap();
        assert_eq!(snap.credential_index, 0);
        assert_eq!(snap.model_index, 0);
        assert!(snap.cooldowns.iter().all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_rotates_credential_and_cools_down() {
        let rotation = ScriptedProvider::new("groq", vec![Err("rate limit exceeded"), Ok("OK")]);
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        let text = c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        assert_eq!(text, "OK");
        let calls = rotation.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].api_key.as_deref(), Some("key-1"));
        assert_eq!(calls[1].api_key.as_deref(), Some("key-2"));

        let snap = c.pool_snapshot().await.unwrap();
        assert_eq!(snap.credential_index, 1);
        assert_cooldown_about(snap.cooldowns[0], 60);
        assert!(snap.cooldowns[1].is_none());
        assert_eq!(Metrics::get(&c.metrics().backoff_sleeps), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_and_billing_use_long_cooldown() {
        for message in ["You exceeded your current quota", "billing account inactive"] {
            let rotation = ScriptedProvider::new("groq", vec![Err(message), Ok("OK")]);
            let c = controller(None, &rotation, &["key-1", "key-2"]);

            c.make_request(&hello(), RequestOptions::default()).await.unwrap();

            let snap = c.pool_snapshot().await.unwrap();
            assert_eq!(snap.credential_index, 1);
            assert_cooldown_about(snap.cooldowns[0], 600);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_overflow_rotates_model_only() {
        let rotation = ScriptedProvider::new(
            "groq",
            vec![Err("This model's maximum context length is 8192 tokens"), Ok("OK")],
        );
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let calls = rotation.calls();
        assert_eq!(calls[0].model.as_deref(), Some("model-a"));
        assert_eq!(calls[1].model.as_deref(), Some("model-b"));
        assert_eq!(calls[1].api_key.as_deref(), Some("key-1"));

        let snap = c.pool_snapshot().await.unwrap();
        assert_eq!(snap.credential_index, 0);
        assert_eq!(snap.model_index, 1);
        assert!(snap.cooldowns.iter().all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_unavailable_rotates_model() {
        let rotation = ScriptedProvider::new(
            "groq",
            vec![Err("The model `model-a` has been decommissioned"), Ok("OK")],
        );
        let c = controller(None, &rotation, &["key-1"]);

        c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let snap = c.pool_snapshot().await.unwrap();
        assert_eq!(snap.model, "model-b");
        assert_eq!(snap.credential_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_rotates_credential_by_default() {
        let rotation =
            ScriptedProvider::new("groq", vec![Err("connection reset by peer"), Ok("OK")]);
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let snap = c.pool_snapshot().await.unwrap();
        assert_eq!(snap.credential_index, 1);
        assert!(snap.cooldowns.iter().all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_retry_same_when_configured() {
        let rotation =
            ScriptedProvider::new("groq", vec![Err("connection reset by peer"), Ok("OK")]);
        let c = FallbackController::new(
            None,
            Box::new(rotation.clone()),
            CredentialPool::new(["key-1", "key-2"]),
            ModelRoster::new(["model-a", "model-b"]).unwrap(),
            Classifier::new(default_rules(60, 600), RecoveryAction::RetrySame),
            Backoff::default(),
        )
        .unwrap();

        c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let calls = rotation.calls();
        assert_eq!(calls[1].api_key.as_deref(), Some("key-1"));
        assert_eq!(calls[1].model.as_deref(), Some("model-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_stops_after_max_retries() {
        let rotation = ScriptedProvider::failing_forever("groq", "internal server error");
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        let err = c
            .make_request(&hello(), RequestOptions::default().with_max_retries(4))
            .await
            .unwrap_err();

        match err {
            ForgeError::ExhaustedRetries { attempts, last_error } => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("internal server error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(rotation.calls().len(), 4);
        // No sleep after the final attempt.
        assert_eq!(Metrics::get(&c.metrics().backoff_sleeps), 3);
        assert_eq!(Metrics::get(&c.metrics().requests_exhausted), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_exponentially_between_attempts() {
        let rotation = ScriptedProvider::new(
            "groq",
            vec![
                Err("internal server error"),
                Err("internal server error"),
                Err("internal server error"),
                Err("internal server error"),
                Ok("OK"),
            ],
        );
        let c = controller(None, &rotation, &["key-1", "key-2"]);
        let start = tokio::time::Instant::now();

        let text = c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let waited = start.elapsed();
        assert_eq!(text, "OK");
        assert_eq!(rotation.calls().len(), 5);
        assert_eq!(Metrics::get(&c.metrics().backoff_sleeps), 4);
        // 2^0 + 2^1 + 2^2 + 2^3, each with up to one second of jitter.
        assert!(waited >= Duration::from_secs(15), "waited only {waited:?}");
        assert!(waited < Duration::from_secs(19), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_makes_no_calls() {
        let rotation = ScriptedProvider::new("groq", vec![Ok("OK")]);
        let c = controller(None, &rotation, &["key-1"]);

        let err = c
            .make_request(&hello(), RequestOptions::default().with_max_retries(0))
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert!(rotation.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_credentials_cooling_down_still_terminates() {
        let rotation = ScriptedProvider::failing_forever("groq", "Rate limit reached");
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        let err = c
            .make_request(&hello(), RequestOptions::default().with_max_retries(5))
            .await
            .unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(rotation.calls().len(), 5);
        let snap = c.pool_snapshot().await.unwrap();
        // Both keys end up cooling down; rotation stays on the last one.
        assert_eq!(snap.credential_index, 1);
        assert!(snap.cooldowns.iter().all(Option::is_some));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferred_answers_first() {
        let preferred = ScriptedProvider::new("gemini", vec![Ok("from gemini")]);
        let rotation = ScriptedProvider::new("groq", vec![Ok("from groq")]);
        let c = controller(Some(&preferred), &rotation, &["key-1"]);

        let text = c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        assert_eq!(text, "from gemini");
        assert!(rotation.calls().is_empty());
        assert!(c.preferred_active());
        assert_eq!(preferred.calls()[0].api_key, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferred_disabled_after_first_failure() {
        let preferred = ScriptedProvider::new("gemini", vec![Err("500 backend error"), Ok("late")]);
        let rotation = ScriptedProvider::new("groq", vec![Ok("first"), Ok("second")]);
        let c = controller(Some(&preferred), &rotation, &["key-1"]);

        assert_eq!(c.make_request(&hello(), RequestOptions::default()).await.unwrap(), "first");
        assert_eq!(c.make_request(&hello(), RequestOptions::default()).await.unwrap(), "second");

        assert_eq!(preferred.calls().len(), 1);
        assert_eq!(rotation.calls().len(), 2);
        assert!(!c.preferred_active());
        assert_eq!(Metrics::get(&c.metrics().preferred_failures), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preferred_only_failure_is_terminal() {
        let preferred = ScriptedProvider::new("gemini", vec![Err("API key not valid")]);
        let rotation = ScriptedProvider::new("groq", vec![]);
        let c = controller(Some(&preferred), &rotation, &[]);

        let err = c.make_request(&hello(), RequestOptions::default()).await.unwrap_err();
        match err {
            ForgeError::ExhaustedRetries { attempts, last_error } => {
                assert_eq!(attempts, 0);
                assert!(last_error.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(c.pool_snapshot().await.is_none());
    }

    #[test]
    fn test_no_backend_fails_at_construction() {
        let rotation = ScriptedProvider::new("groq", vec![]);
        let result = FallbackController::new(
            None,
            Box::new(rotation.clone()),
            CredentialPool::new(Vec::<String>::new()),
            ModelRoster::default(),
            Classifier::default(),
            Backoff::default(),
        );

        assert!(matches!(result, Err(ForgeError::NoUsableBackend(_))));
        assert!(rotation.calls().is_empty());
    }

    #[test]
    fn test_from_config_requires_a_backend() {
        let mut config = ForgeConfig::default();
        config.preferred.enabled = false;
        let none = |_: &str| None;
        assert!(matches!(
            FallbackController::from_config_with(&config, none),
            Err(ForgeError::NoUsableBackend(_))
        ));

        let keys = |name: &str| (name == "GROQ_API_KEY_2").then(|| "gsk_test".to_string());
        let c = FallbackController::from_config_with(&config, keys).unwrap();
        assert!(!c.preferred_active());

        config.preferred.enabled = true;
        let gemini = |name: &str| (name == "GEMINI_API_KEY").then(|| "g".to_string());
        let c = FallbackController::from_config_with(&config, gemini).unwrap();
        assert!(c.preferred_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_kinds_in_metrics() {
        let rotation = ScriptedProvider::new(
            "groq",
            vec![Err("too many requests"), Err("context too long"), Ok("OK")],
        );
        let c = controller(None, &rotation, &["key-1", "key-2"]);

        c.make_request(&hello(), RequestOptions::default()).await.unwrap();

        let m = c.metrics();
        assert_eq!(Metrics::get(&m.attempts_total), 3);
        assert_eq!(Metrics::get(&m.attempts_failed), 2);
        assert_eq!(Metrics::get(&m.credential_rotations), 1);
        assert_eq!(Metrics::get(&m.model_rotations), 1);
        assert_eq!(Metrics::get(&m.cooldowns_applied), 1);
        assert_eq!(
            c.classifier.classify("too many requests").kind,
            FailureKind::RateLimited
        );
    }
}
