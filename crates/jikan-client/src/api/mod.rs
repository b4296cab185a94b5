//! Jikan API v4 access layer.
//!
//! This module provides a rate-limited, cached, retry-enabled client for
//! the Jikan API (MyAnimeList unofficial API), plus one binding per
//! upstream endpoint.

pub mod client;
pub mod endpoints;
pub mod rate_limiter;
pub mod types;

pub use client::{ClientOptions, Envelope, JikanClient};
pub use rate_limiter::RateLimiter;
