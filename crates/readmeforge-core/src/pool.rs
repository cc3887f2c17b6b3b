//! Credential pool and model roster: the rotating state behind the
//! fallback controller.
//!
//! Neither type performs I/O. Time-dependent operations have an `_at`
//! variant taking an explicit instant.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Ordered API credentials with per-credential cooldowns.
///
/// Never empty, and `current` is always a valid index.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<String>,
    cooldowns: HashMap<String, DateTime<Utc>>,
    current: usize,
}

impl CredentialPool {
    /// Build a pool from raw credentials, dropping empty entries.
    /// Returns `None` when nothing usable remains.
    pub fn new<I, S>(credentials: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials: Vec<String> = credentials
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.trim().is_empty())
            .collect();

        if credentials.is_empty() {
            return None;
        }

        Some(Self {
            credentials,
            cooldowns: HashMap::new(),
            current: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &str {
        &self.credentials[self.current]
    }

    /// Credential at `index`, masked for logs.
    pub fn masked(&self, index: usize) -> String {
        mask(&self.credentials[index % self.credentials.len()])
    }

    /// When the credential at `index` becomes usable again, if penalized.
    pub fn cooldown_until(&self, index: usize) -> Option<DateTime<Utc>> {
        self.credentials
            .get(index)
            .and_then(|key| self.cooldowns.get(key))
            .copied()
    }

    pub fn is_available(&self, index: usize) -> bool {
        self.is_available_at(index, Utc::now())
    }

    pub fn is_available_at(&self, index: usize, now: DateTime<Utc>) -> bool {
        match self.cooldown_until(index) {
            Some(until) => until <= now,
            None => true,
        }
    }

    pub fn mark_on_cooldown(&mut self, index: usize, duration: Duration) {
        self.mark_on_cooldown_at(index, duration, Utc::now());
    }

    pub fn mark_on_cooldown_at(&mut self, index: usize, duration: Duration, now: DateTime<Utc>) {
        let Some(key) = self.credentials.get(index) else {
            return;
        };
        let duration = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let until = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.cooldowns.insert(key.clone(), until);
    }

    /// Advance to the next available credential, wrapping around.
    ///
    /// If every other credential is cooling down, the walk stops back at
    /// the starting index and that credential is reused.
    pub fn rotate(&mut self) -> usize {
        self.rotate_at(Utc::now())
    }

    pub fn rotate_at(&mut self, now: DateTime<Utc>) -> usize {
        let start = self.current;
        loop {
            self.current = (self.current + 1) % self.credentials.len();
            if self.current == start || self.is_available_at(self.current, now) {
                break;
            }
        }
        self.current
    }
}

/// Ordered model identifiers. Duplicates bias rotation frequency.
#[derive(Debug, Clone)]
pub struct ModelRoster {
    models: Vec<String>,
    current: usize,
}

impl ModelRoster {
    /// Build a roster, dropping empty entries. Returns `None` when empty.
    pub fn new<I, S>(models: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<String> = models
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.trim().is_empty())
            .collect();

        if models.is_empty() {
            return None;
        }

        Some(Self { models, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &str {
        &self.models[self.current]
    }

    /// Advance to the next model unconditionally, wrapping around.
    pub fn rotate(&mut self) -> usize {
        self.current = (self.current + 1) % self.models.len();
        self.current
    }
}

impl Default for ModelRoster {
    fn default() -> Self {
        Self {
            models: crate::config::default_models(),
            current: 0,
        }
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
