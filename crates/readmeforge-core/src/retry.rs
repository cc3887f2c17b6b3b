//! Retry primitives: request options, capped exponential backoff, and the
//! per-attempt record the controller logs.

use std::time::Duration;

use rand::RngExt;

use crate::classify::FailureKind;

/// Per-call generation and retry parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Attempts against the credential/model pool (the preferred provider's
    /// single try is not counted).
    pub max_retries: usize,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.2,
            max_retries: 15,
        }
    }
}

impl RequestOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Capped exponential backoff with jitter: `min(2^attempt + U(0,1), cap)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    cap: Duration,
}

impl Backoff {
    pub fn new(cap: Duration) -> Self {
        // A zero cap would make the delay zero; keep it strictly positive.
        let cap = cap.max(Duration::from_millis(1));
        Self { cap }
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let jitter: f64 = rand::rng().random_range(0.0..1.0);
        self.delay_with_jitter(attempt, jitter)
    }

    /// `jitter` is clamped into `[0, 1]`.
    pub fn delay_with_jitter(&self, attempt: usize, jitter: f64) -> Duration {
        let exponent = attempt.min(62) as i32;
        let secs = 2f64.powi(exponent) + jitter.clamp(0.0, 1.0);
        let capped = secs.min(self.cap.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

/// One attempt against the pool, emitted to the log.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub attempt: usize,
    pub credential_index: usize,
    pub model: String,
    /// Backoff applied after this attempt; zero on success or on the last one.
    pub delay: Duration,
    pub outcome: AttemptOutcome,
}

impl RequestAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success(_))
    }
}

impl std::fmt::Display for RequestAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::Success(text) => write!(
                f,
                "attempt {}: key #{} model {} ok ({} chars)",
                self.attempt + 1,
                self.credential_index + 1,
                self.model,
                text.len()
            ),
            AttemptOutcome::Failure { kind, message } => write!(
                f,
                "attempt {}: key #{} model {} failed [{}]: {}",
                self.attempt + 1,
                self.credential_index + 1,
                self.model,
                kind,
                message.lines().next().unwrap_or_default()
            ),
        }
    }
}
