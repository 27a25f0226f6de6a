//! Shared HTTP request discipline for JSON-API adapters: bounded
//! concurrency, timeouts, and exponential backoff on transient failure.
//! Grounded on `base.py`'s `fetch_json`/semaphore pattern and the
//! teacher's `PinnacleService` retry loop (`odds-engine/src/pinnacle/mod.rs`).

use crate::error::ScrapeError;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

/// Request/error counters surfaced by each adapter, the Rust analogue of
/// `base.py::get_stats`.
#[derive(Default)]
pub struct ScraperStats {
    pub requests: AtomicU64,
    pub errors: AtomicU64,
}

impl ScraperStats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (self.requests.load(Ordering::Relaxed), self.errors.load(Ordering::Relaxed))
    }
}

/// Shared plumbing every plain-JSON adapter wraps: a semaphore bounding
/// in-flight requests, a configured `reqwest::Client`, and a retrying
/// `get_json` helper.
pub struct HttpClient {
    client: Client,
    semaphore: Semaphore,
    max_retries: u32,
    stats: ScraperStats,
}

impl HttpClient {
    pub fn new(timeout_seconds: f64, max_concurrent: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(timeout_seconds))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .expect("reqwest client config is static and always valid");

        Self {
            client,
            semaphore: Semaphore::new(max_concurrent),
            max_retries: 3,
            stats: ScraperStats::default(),
        }
    }

    pub fn stats(&self) -> &ScraperStats {
        &self.stats
    }

    /// GET `url` and decode as JSON, retrying transient failures with
    /// exponential backoff (`2^attempt` seconds), matching the teacher's
    /// hand-rolled retry loop rather than pulling in a backoff crate.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value, ScrapeError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        self.stats.record_request();

        let mut attempt = 0;
        loop {
            let result = self.client.get(url).send().await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json().await.map_err(|e| {
                        self.stats.record_error();
                        ScrapeError::Parse(e.to_string())
                    });
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(2u64.pow(attempt + 1));
                    self.stats.record_error();
                    return Err(ScrapeError::RateLimited { retry_after_secs: retry_after });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    self.stats.record_error();
                    if attempt >= self.max_retries {
                        return Err(ScrapeError::Http { status, url: url.to_string() });
                    }
                }
                Err(e) if e.is_timeout() => {
                    self.stats.record_error();
                    if attempt >= self.max_retries {
                        return Err(ScrapeError::Timeout { url: url.to_string() });
                    }
                }
                Err(e) => {
                    self.stats.record_error();
                    if attempt >= self.max_retries {
                        return Err(ScrapeError::Transport(e));
                    }
                }
            }

            let backoff = Duration::from_secs(2u64.pow(attempt));
            warn!(url, attempt, backoff_secs = backoff.as_secs(), "retrying after transient scrape failure");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// GET `url` and return the raw response body, for endpoints that
    /// aren't JSON (Meridian's auth token lives in an HTML landing page).
    /// No retry loop — a landing-page fetch that fails once almost always
    /// fails the same way again within a cycle.
    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        self.stats.record_request();

        let response = self.client.get(url).send().await.map_err(|e| {
            self.stats.record_error();
            ScrapeError::Transport(e)
        })?;

        if !response.status().is_success() {
            self.stats.record_error();
            return Err(ScrapeError::Http { status: response.status().as_u16(), url: url.to_string() });
        }

        response.text().await.map_err(|e| {
            self.stats.record_error();
            ScrapeError::Parse(e.to_string())
        })
    }

    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value, ScrapeError> {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        self.stats.record_request();

        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            self.stats.record_error();
            ScrapeError::Transport(e)
        })?;

        if !response.status().is_success() {
            self.stats.record_error();
            return Err(ScrapeError::Http { status: response.status().as_u16(), url: url.to_string() });
        }

        response.json().await.map_err(|e| {
            self.stats.record_error();
            ScrapeError::Parse(e.to_string())
        })
    }
}

/// Parse `"Team A - Team B"` style match titles, trying the primary
/// separator then a handful of common fallbacks, matching
/// `base.py::parse_teams`.
pub fn parse_teams(match_name: &str, separator: &str) -> (String, String) {
    if let Some((a, b)) = match_name.split_once(separator) {
        return (a.trim().to_string(), b.trim().to_string());
    }
    for sep in [" vs ", " v ", " @ ", "-"] {
        if let Some((a, b)) = match_name.split_once(sep) {
            return (a.trim().to_string(), b.trim().to_string());
        }
    }
    (match_name.trim().to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primary_separator() {
        assert_eq!(
            parse_teams("Partizan - Crvena Zvezda", " - "),
            ("Partizan".to_string(), "Crvena Zvezda".to_string())
        );
    }

    #[test]
    fn falls_back_to_vs() {
        assert_eq!(
            parse_teams("Lakers vs Celtics", " - "),
            ("Lakers".to_string(), "Celtics".to_string())
        );
    }

    #[test]
    fn last_resort_passthrough() {
        assert_eq!(parse_teams("No Separator Here", " - "), ("No Separator Here".to_string(), String::new()));
    }
}
