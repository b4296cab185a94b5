//! Jikan API client: request execution, retry policy, and the fetch façade.

use super::rate_limiter::RateLimiter;
use crate::cache::ResponseCache;
use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Tuning knobs for the client, normally filled from `shared::Config`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum requests per second
    pub requests_per_second: u32,
    /// Maximum requests per minute
    pub requests_per_minute: u32,
    /// Whether responses are cached at all
    pub cache_enabled: bool,
    /// Lifetime of a cached response
    pub cache_ttl: Duration,
    /// Maximum retries for retryable failures (attempts = retries + 1)
    pub max_retries: u32,
    /// Base retry delay, scaled linearly per retry
    pub retry_delay: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            requests_per_second: 3,
            requests_per_minute: 60,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Response envelope handed to callers.
///
/// `cached` tells the consumer whether the payload came from the response
/// cache; `last_modified` and `fingerprint` carry upstream provenance.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub data: T,
    pub cached: bool,
    pub last_modified: Option<String>,
    pub fingerprint: Option<String>,
}

impl<T> Envelope<T> {
    /// Reshape the payload while keeping the cache/provenance metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            data: f(self.data),
            cached: self.cached,
            last_modified: self.last_modified,
            fingerprint: self.fingerprint,
        }
    }
}

/// Parsed successful response before caching/shaping.
struct RawResponse {
    body: Value,
    last_modified: Option<String>,
    fingerprint: Option<String>,
}

/// Jikan API v4 client
///
/// Owns the rate limiter and the response cache; construct one at startup
/// and share it wherever requests are made.
pub struct JikanClient {
    /// HTTP client
    http: Client,
    /// Base URL for the Jikan API
    base_url: String,
    /// Rate limiter, consulted before every network attempt
    rate_limiter: RateLimiter,
    /// Response cache
    cache: ResponseCache,
    cache_enabled: bool,
    max_retries: u32,
    retry_delay: Duration,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(base_url: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent("jikan-client/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            rate_limiter: RateLimiter::new(
                options.requests_per_second,
                options.requests_per_minute,
            ),
            cache: ResponseCache::new(options.cache_ttl),
            cache_enabled: options.cache_enabled,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
        })
    }

    /// Fetch `path`, going through cache lookup, rate-limit admission,
    /// request execution, and cache write.
    ///
    /// `path` doubles as the cache key. Concurrent misses for the same key
    /// are not deduplicated; both fetch and the later write wins.
    pub async fn fetch_data(&self, path: &str, use_cache: bool) -> Result<Envelope<Value>, ApiError> {
        let use_cache = use_cache && self.cache_enabled;

        if use_cache {
            if let Some(entry) = self.cache.get(path).await {
                return Ok(Envelope {
                    data: entry.data,
                    cached: true,
                    last_modified: Some(entry.last_modified),
                    fingerprint: entry.fingerprint,
                });
            }
        }

        let url = format!("{}{}", self.base_url, path);
        let response = self.execute(&url).await?;

        if use_cache {
            self.cache
                .put(
                    path,
                    response.body.clone(),
                    response.last_modified.clone(),
                    response.fingerprint.clone(),
                )
                .await;
        }

        Ok(Envelope {
            data: response.body,
            cached: false,
            last_modified: response.last_modified,
            fingerprint: response.fingerprint,
        })
    }

    /// Typed variant of [`fetch_data`](Self::fetch_data): reshapes the JSON
    /// payload at the boundary instead of handing out dynamic values.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        use_cache: bool,
    ) -> Result<Envelope<T>, ApiError> {
        let envelope = self.fetch_data(path, use_cache).await?;
        let cached = envelope.cached;
        let last_modified = envelope.last_modified;
        let fingerprint = envelope.fingerprint;

        let data = serde_json::from_value(envelope.data).map_err(|source| {
            ApiError::MalformedData {
                url: format!("{}{}", self.base_url, path),
                source,
            }
        })?;

        Ok(Envelope {
            data,
            cached,
            last_modified,
            fingerprint,
        })
    }

    /// Perform a GET with rate limiting and retries.
    ///
    /// Retryable failures are HTTP 429 and network errors; everything else
    /// surfaces immediately. Backoff is linear in the retry count. A 429
    /// carrying `Retry-After` gets one extra replay after the advertised
    /// wait, outside the generic budget; later 429s inside the budget wait
    /// the larger of the header value and the backoff.
    async fn execute(&self, url: &str) -> Result<RawResponse, ApiError> {
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;
        let mut header_wait_spent = false;

        loop {
            self.rate_limiter.acquire().await;
            attempts += 1;
            debug!(url = %url, attempt = attempts, "Making API request");

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.read_body(url, response).await;
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = retry_after_seconds(&response);

                        if let Some(secs) = retry_after {
                            if !header_wait_spent {
                                header_wait_spent = true;
                                warn!(
                                    url = %url,
                                    wait_secs = secs,
                                    "Rate limited upstream, honoring Retry-After"
                                );
                                sleep(Duration::from_secs(secs)).await;
                                continue;
                            }
                        }

                        if retries < self.max_retries {
                            retries += 1;
                            let mut delay = self.retry_delay * retries;
                            if let Some(secs) = retry_after {
                                delay = delay.max(Duration::from_secs(secs));
                            }
                            warn!(
                                url = %url,
                                retry = retries,
                                delay_ms = delay.as_millis() as u64,
                                "Rate limited upstream, backing off"
                            );
                            sleep(delay).await;
                            continue;
                        }

                        return Err(ApiError::RateLimited {
                            url: url.to_string(),
                            attempts,
                        });
                    }

                    warn!(url = %url, status = %status, "Request failed");
                    return Err(ApiError::Status {
                        status,
                        url: url.to_string(),
                    });
                }
                Err(source) => {
                    if retries < self.max_retries {
                        retries += 1;
                        let delay = self.retry_delay * retries;
                        warn!(
                            url = %url,
                            error = %source,
                            retry = retries,
                            delay_ms = delay.as_millis() as u64,
                            "Network error, retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }

                    return Err(ApiError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Capture provenance headers and parse the body of a 2xx response.
    async fn read_body(&self, url: &str, response: Response) -> Result<RawResponse, ApiError> {
        let last_modified = header_string(&response, "last-modified");
        let fingerprint = header_string(&response, "x-request-fingerprint");

        let text = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let body = serde_json::from_str(&text).map_err(|source| ApiError::MalformedData {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %url, "Request successful");
        Ok(RawResponse {
            body,
            last_modified,
            fingerprint,
        })
    }
}

fn header_string(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn retry_after_seconds(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
