//! Shared library for the Jikan access layer.
//!
//! This crate provides functionality used across the workspace:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{ApiConfig, CacheConfig, Config, RateLimitConfig, RetryConfig};
pub use logging::LogConfig;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
