//! # ReadmeForge Hub
//!
//! Concrete LLM adapters, the fallback/retry controller, runtime metrics,
//! the README generation pipeline built on top of them, and the HTTP API
//! that serves it.

pub mod api;
pub mod metrics;
pub mod pipeline;
pub mod providers;
