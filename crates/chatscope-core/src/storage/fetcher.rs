//! Retrying snapshot fetcher.
//!
//! Order of operations for one `fetch`: optional cache eviction (`force_fresh`),
//! cache lookup, then up to `max_retries` network attempts with exponential
//! backoff. Large bodies are read chunk by chunk and report throttled progress.
//! A successful network fetch is written back to the cache in the background.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use super::cache::SnapshotCache;
use crate::config::FetchConfig;
use crate::error::{CacheError, NetworkError, Result};

/// Upper bound on how much we preallocate from a server-declared length
const MAX_PREALLOC: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    pub bytes: Bytes,
    pub source: SnapshotSource,
    pub fetched_at: DateTime<Utc>,
    /// Network attempts spent; zero for a cache hit
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchProgress {
    pub received: u64,
    pub total: Option<u64>,
    pub percent: Option<f64>,
    /// Throughput since the previous event
    pub bytes_per_sec: f64,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_retries: u32,
    pub use_cache: bool,
    pub force_fresh: bool,
    pub progress: Option<UnboundedSender<FetchProgress>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: crate::constants::DEFAULT_MAX_RETRIES,
            use_cache: true,
            force_fresh: false,
            progress: None,
        }
    }
}

/// Delay slept after failed attempt `attempt` (1-based): `base * 2^attempt`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Emits at most one event per `interval`.
struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
    last_received: u64,
}

impl ProgressThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            last_received: 0,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        }
    }

    fn event(&mut self, now: Instant, started: Instant, received: u64, total: Option<u64>, done: bool) -> FetchProgress {
        let since = self.last_emit.unwrap_or(started);
        let elapsed = now.duration_since(since).as_secs_f64();
        let bytes_per_sec = if elapsed > 0.0 {
            (received - self.last_received) as f64 / elapsed
        } else {
            0.0
        };
        self.last_emit = Some(now);
        self.last_received = received;

        let percent = match total {
            Some(total) if total > 0 => Some((received as f64 / total as f64 * 100.0).min(100.0)),
            _ if done => Some(100.0),
            _ => None,
        };

        FetchProgress {
            received,
            total,
            percent,
            bytes_per_sec,
            done,
        }
    }
}

pub struct SnapshotFetcher {
    url: String,
    client: reqwest::Client,
    cache: Option<SnapshotCache>,
    config: FetchConfig,
    network_attempts: AtomicU32,
}

impl SnapshotFetcher {
    pub fn new(url: impl Into<String>, cache: Option<SnapshotCache>, config: FetchConfig) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NetworkError::Connection {
                url: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            url,
            client,
            cache,
            config,
            network_attempts: AtomicU32::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache(&self) -> Option<&SnapshotCache> {
        self.cache.as_ref()
    }

    /// Total network attempts made by this fetcher, across all fetches.
    pub fn network_attempts(&self) -> u32 {
        self.network_attempts.load(Ordering::Relaxed)
    }

    pub fn check_cache(&self) -> bool {
        self.cache.as_ref().is_some_and(|cache| cache.check(&self.url))
    }

    pub async fn fetch_from_cache(&self) -> std::result::Result<Bytes, CacheError> {
        let cache = self.cache.as_ref().ok_or_else(|| CacheError::Missing { key: self.url.clone() })?;
        let (meta, bytes) = cache.read().await?;
        if meta.url != self.url {
            return Err(CacheError::Inconsistent {
                key: cache.key().to_string(),
                detail: format!("entry was fetched from {}", meta.url),
            });
        }
        Ok(bytes)
    }

    pub async fn save_to_cache(&self, bytes: &Bytes) -> std::result::Result<(), CacheError> {
        if let Some(cache) = &self.cache {
            cache.save(&self.url, bytes).await?;
        }
        Ok(())
    }

    pub async fn clear_cache(&self) -> std::result::Result<(), CacheError> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
        }
        Ok(())
    }

    #[instrument(skip(self, options), fields(url = %self.url))]
    pub async fn fetch(&self, options: FetchOptions) -> Result<FetchedSnapshot> {
        if options.force_fresh {
            if let Err(e) = self.clear_cache().await {
                warn!(error = %e, "failed to clear snapshot cache");
            }
        }

        if options.use_cache && !options.force_fresh && self.check_cache() {
            match self.fetch_from_cache().await {
                Ok(bytes) => {
                    info!(bytes = bytes.len(), "snapshot served from cache");
                    return Ok(FetchedSnapshot {
                        bytes,
                        source: SnapshotSource::Cache,
                        fetched_at: Utc::now(),
                        attempts: 0,
                    });
                }
                Err(e) => warn!(error = %e, "cache read failed, falling back to network"),
            }
        }

        let (bytes, attempts) = self.fetch_with_retries(&options).await?;
        info!(bytes = bytes.len(), attempts, "snapshot downloaded");

        if options.use_cache {
            if let Some(cache) = self.cache.clone() {
                let url = self.url.clone();
                let payload = bytes.clone();
                tokio::spawn(async move {
                    if let Err(e) = cache.save(&url, &payload).await {
                        warn!(error = %e, "failed to cache snapshot");
                    }
                });
            }
        }

        Ok(FetchedSnapshot {
            bytes,
            source: SnapshotSource::Network,
            fetched_at: Utc::now(),
            attempts,
        })
    }

    async fn fetch_with_retries(&self, options: &FetchOptions) -> std::result::Result<(Bytes, u32), NetworkError> {
        let max_attempts = options.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            self.network_attempts.fetch_add(1, Ordering::Relaxed);
            match self.fetch_once(options.progress.as_ref()).await {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) => {
                    let delay = backoff_delay(attempt, self.config.backoff_base);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "snapshot fetch attempt failed"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let last = last_error.unwrap_or_else(|| NetworkError::Connection {
            url: self.url.clone(),
            message: "no attempt was made".to_string(),
        });
        Err(NetworkError::Exhausted {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }

    async fn fetch_once(&self, progress: Option<&UnboundedSender<FetchProgress>>) -> std::result::Result<Bytes, NetworkError> {
        let timeout_secs = self.config.request_timeout.as_secs();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(&self.url, timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        match response.content_length() {
            Some(length) if length < self.config.streaming_threshold => {
                debug!(length, "reading body in one step");
                response
                    .bytes()
                    .await
                    .map_err(|e| NetworkError::from_reqwest(&self.url, timeout_secs, e))
            }
            total => self.read_chunked(response, total, progress).await,
        }
    }

    async fn read_chunked(
        &self,
        mut response: reqwest::Response,
        total: Option<u64>,
        progress: Option<&UnboundedSender<FetchProgress>>,
    ) -> std::result::Result<Bytes, NetworkError> {
        let timeout_secs = self.config.request_timeout.as_secs();
        let started = Instant::now();
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);
        let mut buffer = BytesMut::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        let mut received: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| NetworkError::from_reqwest(&self.url, timeout_secs, e))?
        {
            buffer.extend_from_slice(&chunk);
            received += chunk.len() as u64;

            let now = Instant::now();
            if let Some(tx) = progress {
                if throttle.ready(now) {
                    let _ = tx.send(throttle.event(now, started, received, total, false));
                }
            }
        }

        if let Some(total) = total {
            if received != total {
                return Err(NetworkError::Body {
                    url: self.url.clone(),
                    message: format!("expected {total} bytes, received {received}"),
                });
            }
        }

        if let Some(tx) = progress {
            let _ = tx.send(throttle.event(Instant::now(), started, received, total, true));
        }

        debug!(received, elapsed_ms = started.elapsed().as_millis() as u64, "chunked read finished");
        Ok(buffer.freeze())
    }
}
