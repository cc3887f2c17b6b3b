//! Failure classification: map opaque provider error text to a recovery
//! action.
//!
//! Provider SDKs and HTTP APIs expose no stable error taxonomy, so matching
//! is plain substring search over the lower-cased message. Rules are
//! evaluated in order; the first match wins.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Category of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    ContextOverflow,
    QuotaExhausted,
    ModelUnavailable,
    Unclassified,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ContextOverflow => write!(f, "context_overflow"),
            Self::QuotaExhausted => write!(f, "quota_exhausted"),
            Self::ModelUnavailable => write!(f, "model_unavailable"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// What the controller does to its pool after a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Penalize the active credential, then rotate to another one.
    CooldownAndRotateCredential { cooldown_secs: u64 },
    RotateCredential,
    RotateModel,
    /// Keep both credential and model; only back off.
    RetrySame,
}

impl RecoveryAction {
    pub fn cooldown(&self) -> Option<Duration> {
        match self {
            Self::CooldownAndRotateCredential { cooldown_secs } => {
                Some(Duration::from_secs(*cooldown_secs))
            }
            _ => None,
        }
    }

    pub fn rotates_credential(&self) -> bool {
        matches!(
            self,
            Self::CooldownAndRotateCredential { .. } | Self::RotateCredential
        )
    }

    pub fn rotates_model(&self) -> bool {
        matches!(self, Self::RotateModel)
    }
}

/// One ordered classification rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub kind: FailureKind,
    /// Lower-case substrings; any one matching selects this rule.
    pub needles: Vec<String>,
    #[serde(flatten)]
    pub action: RecoveryAction,
}

impl ClassifierRule {
    pub fn new(kind: FailureKind, needles: &[&str], action: RecoveryAction) -> Self {
        Self {
            kind,
            needles: needles.iter().map(|n| n.to_lowercase()).collect(),
            action,
        }
    }

    /// `lowered` must already be lower-case.
    pub fn matches(&self, lowered: &str) -> bool {
        self.needles
            .iter()
            .any(|needle| lowered.contains(needle.to_lowercase().as_str()))
    }
}

/// Result of classifying one error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: FailureKind,
    pub action: RecoveryAction,
}

/// Ordered rule list plus the action for messages no rule recognizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
    unclassified: RecoveryAction,
}

impl Classifier {
    pub fn new(rules: Vec<ClassifierRule>, unclassified: RecoveryAction) -> Self {
        Self {
            rules,
            unclassified,
        }
    }

    /// Standard rule set with the given cooldowns.
    pub fn with_cooldowns(short: Duration, long: Duration) -> Self {
        Self::new(
            default_rules(short.as_secs(), long.as_secs()),
            RecoveryAction::RotateCredential,
        )
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    pub fn unclassified_action(&self) -> RecoveryAction {
        self.unclassified
    }

    pub fn classify(&self, message: &str) -> Classification {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| Classification {
                kind: rule.kind,
                action: rule.action,
            })
            .unwrap_or(Classification {
                kind: FailureKind::Unclassified,
                action: self.unclassified,
            })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_cooldowns(
            Duration::from_secs(DEFAULT_SHORT_COOLDOWN_SECS),
            Duration::from_secs(DEFAULT_LONG_COOLDOWN_SECS),
        )
    }
}

pub const DEFAULT_SHORT_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_LONG_COOLDOWN_SECS: u64 = 600;

/// Precedence matters: "token" is checked before "quota", so a message such
/// as "token quota exceeded" is treated as a context problem.
pub fn default_rules(short_cooldown_secs: u64, long_cooldown_secs: u64) -> Vec<ClassifierRule> {
    vec![
        ClassifierRule::new(
            FailureKind::RateLimited,
            &["rate limit", "too many requests"],
            RecoveryAction::CooldownAndRotateCredential {
                cooldown_secs: short_cooldown_secs,
            },
        ),
        ClassifierRule::new(
            FailureKind::ContextOverflow,
            &["token", "context"],
            RecoveryAction::RotateModel,
        ),
        ClassifierRule::new(
            FailureKind::QuotaExhausted,
            &["quota", "billing"],
            RecoveryAction::CooldownAndRotateCredential {
                cooldown_secs: long_cooldown_secs,
            },
        ),
        ClassifierRule::new(
            FailureKind::ModelUnavailable,
            &["model", "not available"],
            RecoveryAction::RotateModel,
        ),
    ]
}
