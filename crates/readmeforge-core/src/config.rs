//! Configuration management for ReadmeForge.
//!
//! Values come from an optional TOML file; secrets and a handful of pipeline
//! limits come from the environment. Callers resolve the config once and
//! pass it to constructors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{
    Classifier, ClassifierRule, RecoveryAction, DEFAULT_LONG_COOLDOWN_SECS,
    DEFAULT_SHORT_COOLDOWN_SECS, default_rules,
};
use crate::error::{ForgeError, Result};
use crate::pool::{CredentialPool, ModelRoster};
use crate::retry::{Backoff, RequestOptions};

/// Top-level ReadmeForge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Rotating credential/model pool.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Optional provider tried once before the pool.
    #[serde(default)]
    pub preferred: PreferredSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Credential pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Provider label used in logs and error messages.
    #[serde(default = "default_pool_provider")]
    pub provider: String,

    /// OpenAI-compatible base URL (None = Groq).
    pub api_base: Option<String>,

    /// Environment variables holding credentials, in rotation order.
    #[serde(default = "default_key_env_vars")]
    pub key_env_vars: Vec<String>,

    /// Model roster; duplicates weight rotation.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_short_cooldown")]
    pub short_cooldown_secs: u64,

    #[serde(default = "default_long_cooldown")]
    pub long_cooldown_secs: u64,
}

fn default_pool_provider() -> String {
    "groq".to_string()
}

fn default_key_env_vars() -> Vec<String> {
    vec![
        "GROQ_API_KEY".to_string(),
        "GROQ_API_KEY_2".to_string(),
        "GROQ_API_KEY_3".to_string(),
        "GROQ_API_KEY_4".to_string(),
        "GROQ_API_KEY_5".to_string(),
    ]
}

pub fn default_models() -> Vec<String> {
    vec![
        "deepseek-r1-distill-llama-70b".to_string(),
        "llama-3.3-70b-versatile".to_string(),
        "deepseek-r1-distill-llama-70b".to_string(),
        "llama-3.3-70b-versatile".to_string(),
    ]
}

fn default_short_cooldown() -> u64 {
    DEFAULT_SHORT_COOLDOWN_SECS
}

fn default_long_cooldown() -> u64 {
    DEFAULT_LONG_COOLDOWN_SECS
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            provider: default_pool_provider(),
            api_base: None,
            key_env_vars: default_key_env_vars(),
            models: default_models(),
            short_cooldown_secs: default_short_cooldown(),
            long_cooldown_secs: default_long_cooldown(),
        }
    }
}

/// Preferred (single-shot) provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferredSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_preferred_key_env")]
    pub key_env_var: String,

    #[serde(default = "default_preferred_model")]
    pub model: String,

    /// Generative Language API base (None = Google's public endpoint).
    pub api_base: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_preferred_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_preferred_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for PreferredSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            key_env_var: default_preferred_key_env(),
            model: default_preferred_model(),
            api_base: None,
        }
    }
}

/// Retry controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,

    /// HTTP request timeout per attempt.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Action for errors no rule recognizes.
    #[serde(default = "default_unclassified")]
    pub unclassified: RecoveryAction,

    /// Replaces the built-in rule list when set.
    #[serde(default)]
    pub rules: Option<Vec<ClassifierRule>>,
}

fn default_max_retries() -> usize {
    15
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

fn default_backoff_cap() -> u64 {
    10
}

fn default_timeout() -> u64 {
    120
}

fn default_unclassified() -> RecoveryAction {
    RecoveryAction::RotateCredential
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            backoff_cap_secs: default_backoff_cap(),
            timeout_secs: default_timeout(),
            unclassified: default_unclassified(),
            rules: None,
        }
    }
}

/// README pipeline limits and file filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_max_files_to_show")]
    pub max_files_to_show: usize,

    #[serde(default = "default_max_files_to_process")]
    pub max_files_to_process: usize,

    #[serde(default = "default_files_per_request")]
    pub files_per_request: usize,

    #[serde(default = "default_max_content_per_file")]
    pub max_content_per_file: usize,

    #[serde(default = "default_max_summaries")]
    pub max_summaries: usize,

    #[serde(default = "default_output_file")]
    pub output_file: String,

    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Filename suffixes to skip (".min.js" works as well as ".log").
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,

    /// Hidden files that are still listed.
    #[serde(default = "default_keep_hidden")]
    pub keep_hidden: Vec<String>,
}

fn default_max_files_to_show() -> usize {
    75
}

fn default_max_files_to_process() -> usize {
    15
}

fn default_files_per_request() -> usize {
    4
}

fn default_max_content_per_file() -> usize {
    2500
}

fn default_max_summaries() -> usize {
    25
}

fn default_output_file() -> String {
    "readme.md".to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_skip_dirs() -> Vec<String> {
    strings(&[
        "node_modules", ".git", "__pycache__", ".venv", "venv", "env", "dist", "build",
        ".next", ".nuxt", "coverage", ".nyc_output", ".cache", "tmp", "temp", ".tmp", ".temp",
        "logs", "vendor", "bower_components", ".gradle", ".idea", ".vscode", ".pytest_cache",
        ".mypy_cache", ".tox", ".eggs", "target",
    ])
}

fn default_skip_extensions() -> Vec<String> {
    strings(&[
        ".pyc", ".pyo", ".pyd", ".so", ".dll", ".dylib", ".exe", ".bin", ".log", ".tmp",
        ".temp", ".cache", ".pid", ".lock", ".swp", ".swo", ".DS_Store", ".coverage",
        ".min.js", ".min.css",
    ])
}

fn default_keep_hidden() -> Vec<String> {
    strings(&[".env", ".gitignore", ".dockerignore"])
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_files_to_show: default_max_files_to_show(),
            max_files_to_process: default_max_files_to_process(),
            files_per_request: default_files_per_request(),
            max_content_per_file: default_max_content_per_file(),
            max_summaries: default_max_summaries(),
            output_file: default_output_file(),
            skip_dirs: default_skip_dirs(),
            skip_extensions: default_skip_extensions(),
            keep_hidden: default_keep_hidden(),
        }
    }
}

impl ForgeConfig {
    /// Load config from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("Failed to read config: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ForgeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load config from a path the user named. Unlike [`ForgeConfig::load`],
    /// a missing file is an error.
    pub fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::load(path)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ForgeError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("readmeforge")
            .join("config.toml")
    }

    /// Apply pipeline limit overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply pipeline limit overrides from an arbitrary lookup. Unparseable
    /// or zero values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> Option<usize> {
            let value = lookup(name)?.trim().parse::<usize>().ok()?;
            if value == 0 {
                tracing::warn!("Ignoring {}=0", name);
                return None;
            }
            Some(value)
        };

        let p = &mut self.pipeline;
        if let Some(v) = read("MAX_FILES_TO_SHOW") {
            p.max_files_to_show = v;
        }
        if let Some(v) = read("MAX_FILES_TO_PROCESS") {
            p.max_files_to_process = v;
        }
        if let Some(v) = read("FILES_PER_REQUEST") {
            p.files_per_request = v;
        }
        if let Some(v) = read("MAX_CONTENT_PER_FILE") {
            p.max_content_per_file = v;
        }
        if let Some(v) = read("MAX_SUMMARIES_FOR_README") {
            p.max_summaries = v;
        }
    }

    /// Read pool credentials in configured order, skipping unset or empty
    /// variables.
    pub fn resolve_credentials<F>(&self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.pool
            .key_env_vars
            .iter()
            .filter_map(|var| lookup(var))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Preferred-provider key, if the provider is enabled and a key is set.
    pub fn resolve_preferred_key<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.preferred.enabled {
            return None;
        }
        lookup(&self.preferred.key_env_var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn credential_pool<F>(&self, lookup: F) -> Option<CredentialPool>
    where
        F: Fn(&str) -> Option<String>,
    {
        CredentialPool::new(self.resolve_credentials(lookup))
    }

    pub fn model_roster(&self) -> Result<ModelRoster> {
        ModelRoster::new(self.pool.models.iter().cloned())
            .ok_or_else(|| ForgeError::Config("pool.models must not be empty".to_string()))
    }

    pub fn classifier(&self) -> Classifier {
        let rules = self.retry.rules.clone().unwrap_or_else(|| {
            default_rules(self.pool.short_cooldown_secs, self.pool.long_cooldown_secs)
        });
        Classifier::new(rules, self.retry.unclassified)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(Duration::from_secs(self.retry.backoff_cap_secs))
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            max_tokens: self.retry.max_tokens,
            temperature: self.retry.temperature,
            max_retries: self.retry.max_retries,
        }
    }
}
