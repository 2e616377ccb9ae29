//! Cache-aside, rate-limited client for the sports-data API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use fanpulse_core::{cache_key, CacheStore, Error, RateBudget, Result};

use crate::endpoints::FeedEndpoint;

/// Default HTTP timeout for feed requests, in seconds.
pub const FEED_TIMEOUT_SECS: u64 = 15;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// API token sent in the auth header.
    pub api_token: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl FeedConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FEED_BASE_URL` | — (required) | Sports-data API base URL |
    /// | `FEED_API_TOKEN` | — (required) | API token |
    /// | `FEED_TIMEOUT_SECS` | `15` | HTTP timeout |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("FEED_BASE_URL")
            .map_err(|_| Error::Config("FEED_BASE_URL is not set".into()))?;
        let api_token = std::env::var("FEED_API_TOKEN")
            .map_err(|_| Error::Config("FEED_API_TOKEN is not set".into()))?;
        let timeout_secs = std::env::var("FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(FEED_TIMEOUT_SECS);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Rate-limited cache-aside client for the third-party sports-data API.
///
/// A cache hit is returned without touching the rate budget. On a miss, one
/// budget point is consumed before the external call; an exhausted budget
/// fails fast with [`Error::RateLimitExceeded`] instead of queueing. Safe
/// for concurrent use by multiple workers: cache and budget live in the
/// shared store, this struct holds only handles.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    config: FeedConfig,
    cache: Arc<dyn CacheStore>,
    budget: Arc<dyn RateBudget>,
}

impl FeedClient {
    /// Create a new feed client.
    pub fn new(
        config: FeedConfig,
        cache: Arc<dyn CacheStore>,
        budget: Arc<dyn RateBudget>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "feed",
            component = "client",
            base_url = %config.base_url,
            "Feed client initialized"
        );

        Ok(Self {
            client,
            config,
            cache,
            budget,
        })
    }

    /// Fetch `endpoint` with `params`, using the endpoint's natural TTL.
    pub async fn fetch(&self, endpoint: FeedEndpoint, params: &[(&str, &str)]) -> Result<JsonValue> {
        self.request(endpoint.path(), params, endpoint.cache_ttl())
            .await
    }

    /// Fetch an arbitrary API path with an explicit cache TTL.
    ///
    /// Cache-aside: check the shared cache first; only a miss consumes rate
    /// budget and goes to the network. The response is cached before it is
    /// returned.
    pub async fn request(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        ttl: Duration,
    ) -> Result<JsonValue> {
        let key = cache_key(endpoint, params);

        if let Some(hit) = self.cache.get(&key).await? {
            debug!(
                subsystem = "feed",
                component = "client",
                op = "request",
                cache_key = %key,
                "Cache hit"
            );
            return Ok(hit);
        }

        // Miss: consume budget before the external call. Exhaustion is a
        // distinct, fail-fast error; the caller decides when to retry.
        let consumed = self.budget.try_consume(1).await?;
        debug!(
            subsystem = "feed",
            component = "client",
            op = "request",
            cache_key = %key,
            points_consumed = consumed,
            "Cache miss, calling API"
        );

        let data = self.call_api(endpoint, params).await?;
        self.cache.set(&key, &data, ttl).await?;
        Ok(data)
    }

    /// Invalidate every cached response for an endpoint.
    pub async fn invalidate(&self, endpoint: FeedEndpoint) -> Result<u64> {
        let removed = self
            .cache
            .delete_prefix(&format!("{}:", endpoint.path()))
            .await?;
        info!(
            subsystem = "feed",
            component = "client",
            op = "invalidate",
            endpoint = endpoint.path(),
            result_count = removed,
            "Invalidated cached responses"
        );
        Ok(removed)
    }

    async fn call_api(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<JsonValue> {
        let start = Instant::now();
        let url = format!("{}/{}", self.config.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .header("X-Auth-Token", &self.config.api_token)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Feed request to {endpoint} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                subsystem = "feed",
                component = "client",
                op = "request",
                endpoint,
                status = status.as_u16(),
                "Feed API returned error status"
            );
            return Err(Error::Request(format!(
                "Feed API returned {status} for {endpoint}"
            )));
        }

        let data: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Invalid JSON from {endpoint}: {e}")))?;

        debug!(
            subsystem = "feed",
            component = "client",
            op = "request",
            endpoint,
            duration_ms = start.elapsed().as_millis() as u64,
            "Feed API call complete"
        );

        Ok(data)
    }
}
