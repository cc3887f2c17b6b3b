//! Runtime metrics: attempts, rotations, backoff sleeps, tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one fallback controller.
#[derive(Debug, Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_exhausted: AtomicU64,
    pub attempts_total: AtomicU64,
    pub attempts_failed: AtomicU64,
    pub credential_rotations: AtomicU64,
    pub model_rotations: AtomicU64,
    pub cooldowns_applied: AtomicU64,
    pub backoff_sleeps: AtomicU64,
    pub preferred_calls: AtomicU64,
    pub preferred_failures: AtomicU64,
    pub tokens_total: AtomicU64,
    start_time: Option<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_attempt(&self, success: bool) {
        self.attempts_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.attempts_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_preferred(&self, success: bool) {
        self.preferred_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.preferred_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_credential_rotation(&self) {
        self.credential_rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_rotation(&self) {
        self.model_rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown(&self) {
        self.cooldowns_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sleep(&self) {
        self.backoff_sleeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tokens(&self, tokens: u32) {
        self.tokens_total.fetch_add(u64::from(tokens), Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Export as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        let uptime = self.uptime_secs();
        let minutes = uptime / 60;
        let seconds = uptime % 60;

        serde_json::json!({
            "uptime": format!("{}m {}s", minutes, seconds),
            "uptime_secs": uptime,
            "requests": {
                "total": Self::get(&self.requests_total),
                "success": Self::get(&self.requests_success),
                "exhausted": Self::get(&self.requests_exhausted),
            },
            "attempts": {
                "total": Self::get(&self.attempts_total),
                "failed": Self::get(&self.attempts_failed),
            },
            "rotations": {
                "credential": Self::get(&self.credential_rotations),
                "model": Self::get(&self.model_rotations),
            },
            "cooldowns": Self::get(&self.cooldowns_applied),
            "backoff_sleeps": Self::get(&self.backoff_sleeps),
            "preferred": {
                "calls": Self::get(&self.preferred_calls),
                "failures": Self::get(&self.preferred_failures),
            },
            "tokens": Self::get(&self.tokens_total),
        })
    }
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

pub fn new_metrics() -> SharedMetrics {
    Arc::new(Metrics::new())
}
