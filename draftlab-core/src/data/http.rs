//! Blocking JSON client shared by HTTP ranking sources.
//!
//! Retries transient failures with exponential backoff plus jitter, consults
//! the source's circuit breaker before every attempt, and checks the caller's
//! cancel token while waiting between attempts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::cancel::CancelToken;
use super::circuit_breaker::CircuitBreaker;
use super::provider::FetchError;

const USER_AGENT: &str = concat!("draftlab/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct JsonClient {
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    settings: HttpSettings,
}

impl JsonClient {
    pub fn new(breaker: Arc<CircuitBreaker>, settings: HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            breaker,
            settings,
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// GET `url` and decode the body as JSON.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<T, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.base_delay, attempt);
                debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                sleep_unless_cancelled(delay, cancel)?;
            }
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if !self.breaker.is_allowed() {
                return Err(FetchError::CircuitOpen {
                    remaining_secs: self.breaker.remaining_cooldown().as_secs(),
                });
            }

            match self.attempt(url) {
                Ok(body) => {
                    self.breaker.record_success();
                    return serde_json::from_str(&body).map_err(|e| {
                        FetchError::ResponseFormatChanged(format!("{url}: {e}"))
                    });
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }

    fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                FetchError::NetworkUnreachable(e.to_string())
            } else {
                FetchError::Other(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            self.breaker.trip();
            return Err(FetchError::CircuitOpen {
                remaining_secs: self.breaker.remaining_cooldown().as_secs(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.breaker.record_failure();
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.breaker.record_failure();
            }
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("reading body of {url}: {e}")))
    }
}

/// `base * 2^(attempt-1)` plus up to 25% random jitter.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64 / 4);
    exp + Duration::from_millis(jitter_ms)
}

fn sleep_unless_cancelled(total: Duration, cancel: &CancelToken) -> Result<(), FetchError> {
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        std::thread::sleep(remaining.min(Duration::from_millis(50)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_with_bounded_jitter() {
        let base = Duration::from_millis(100);
        for attempt in 1..=4 {
            let d = backoff_delay(base, attempt);
            let exp = 100 * 2u64.pow(attempt - 1);
            assert!(d.as_millis() as u64 >= exp);
            assert!(d.as_millis() as u64 <= exp + exp / 4);
        }
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let start = Instant::now();
        let err = sleep_unless_cancelled(Duration::from_secs(5), &cancel).unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
