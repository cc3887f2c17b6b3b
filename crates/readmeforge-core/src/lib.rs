//! # ReadmeForge Core
//!
//! Shared types, traits, and retry state for ReadmeForge.
//! Everything here is free of network I/O; concrete providers and the
//! fallback controller live in `readmeforge-hub`.

pub mod classify;
pub mod config;
pub mod error;
pub mod message;
pub mod pool;
pub mod provider;
pub mod retry;
