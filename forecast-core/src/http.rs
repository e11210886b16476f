//! HTTP client decorator with bounded retry and an on-disk response cache.
//!
//! Only successful GET responses are cached. Cache failures are logged and
//! otherwise ignored: a broken cache directory degrades to plain fetching.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, instrument, warn};

use crate::{
    config::HttpPolicy,
    error::{DigestError, Result, truncate_body},
};

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

impl HttpPolicy {
    /// Sleep before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(30) as i32;
        let secs = self.backoff_factor_secs * 2f64.powi(exp);
        Duration::from_secs_f64(secs.max(0.0)).min(MAX_BACKOFF)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Statuses that usually clear up on their own.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    stored_at: DateTime<Utc>,
    body: String,
}

/// Response bodies keyed by request URL, one JSON file per entry.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self { dir, ttl }
    }

    pub fn key(url: &Url) -> String {
        blake3::hash(url.as_str().as_bytes()).to_hex().to_string()
    }

    fn entry_path(&self, url: &Url) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(url)))
    }

    /// Fresh cached body for `url`, if any.
    pub async fn get(&self, url: &Url) -> Option<String> {
        let path = self.entry_path(url);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt cache entry");
                return None;
            }
        };

        // The entry must belong to this exact URL.
        if entry.url != url.as_str() {
            return None;
        }

        let age = Utc::now().signed_duration_since(entry.stored_at);
        match age.to_std() {
            Ok(age) if age < self.ttl => Some(entry.body),
            _ => {
                debug!(path = %path.display(), "Removing expired cache entry");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove cache entry");
                }
                None
            }
        }
    }

    pub async fn put(&self, url: &Url, body: &str) {
        let entry = CacheEntry { url: url.to_string(), stored_at: Utc::now(), body: body.to_string() };
        let path = self.entry_path(url);

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let json = serde_json::to_vec(&entry).map_err(std::io::Error::other)?;
            tokio::fs::write(&path, json).await
        };

        if let Err(e) = write.await {
            warn!(path = %path.display(), error = %e, "Failed to write cache entry");
        }
    }
}

/// GET client that retries transient failures and caches successful bodies.
#[derive(Debug, Clone)]
pub struct CachedClient {
    http: Client,
    policy: HttpPolicy,
    cache: Option<ResponseCache>,
}

impl CachedClient {
    /// `cache_dir = None` or a zero TTL disables caching.
    pub fn new(policy: HttpPolicy, cache_dir: Option<PathBuf>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {e}")))?;

        let cache = cache_dir
            .filter(|_| policy.cache_ttl_secs > 0)
            .map(|dir| ResponseCache::new(dir, policy.cache_ttl()));

        Ok(Self { http, policy, cache })
    }

    pub fn policy(&self) -> &HttpPolicy {
        &self.policy
    }

    /// Fetch `base` with the given query and return the body of a 2xx response.
    #[instrument(skip(self, query), fields(url = %base))]
    pub async fn get_text(&self, base: &str, query: &[(&str, String)]) -> Result<String> {
        let url = Url::parse_with_params(base, query)
            .map_err(|e| DigestError::Config(format!("Invalid URL '{base}': {e}")))?;

        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(&url).await {
                debug!("Cache hit");
                return Ok(body);
            }
            debug!("Cache miss");
        }

        let body = self.fetch_with_retry(&url).await?;

        if let Some(cache) = &self.cache {
            cache.put(&url, &body).await;
        }

        Ok(body)
    }

    async fn fetch_with_retry(&self, url: &Url) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, "Sending request");

            match self.http.get(url.clone()).send().await {
                Ok(res) => {
                    let status = res.status();

                    if is_retryable_status(status) && attempt < max_attempts {
                        let delay = self.policy.backoff(attempt);
                        warn!(%status, attempt, ?delay, "Retryable status, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    let body = res.text().await.map_err(|source| DigestError::Transport {
                        url: url.to_string(),
                        source,
                    })?;

                    if !status.is_success() {
                        return Err(DigestError::HttpStatus {
                            url: url.to_string(),
                            status,
                            body: truncate_body(&body),
                        });
                    }

                    return Ok(body);
                }
                Err(e) if is_transient(&e) && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(error = %e, attempt, ?delay, "Request failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(DigestError::Transport { url: url.to_string(), source });
                }
            }
        }
    }
}
