//! Client-side access layer for the Jikan API v4.
//!
//! Composes rate limiting, in-memory response caching, and retry handling
//! behind a single fetch façade; consumers call the endpoint bindings and
//! render whatever comes back.

pub mod api;
pub mod cache;
pub mod error;

pub use api::types;
pub use api::{ClientOptions, Envelope, JikanClient, RateLimiter};
pub use cache::{CacheEntry, ResponseCache};
pub use error::ApiError;
