//! # transport
//!
//! HTTP GET against exchange REST endpoints, with bounded retries.
//!
//! ```text
//! RetryingClient::fetch(url)
//!     │
//!     ├─ attempt 1 ── Ok ───────────────────────────▶ payload
//!     │     └─ Err(transient) → sleep U[0, max_backoff]
//!     ├─ attempt 2 ...
//!     ├─ attempt N ── Err(transient) ──────────────▶ FetchError::Exhausted
//!     └─ any attempt ── Err(permanent) ────────────▶ returned as-is, no retry
//! ```
//!
//! The delay is drawn uniformly from `[0, max_backoff]` on every attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;

// ─── Transport ────────────────────────────────────────────────────────────────

/// One raw GET. Implementations classify failures; they never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str) -> Result<Value, FetchError>;
}

/// [`Transport`] over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client:  reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str) -> Result<Value, FetchError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|_| FetchError::InvalidUrl(endpoint.to_string()))?;

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(endpoint, e))?;

        let status = resp.status();
        // 418 is Binance's "you ignored the 429s" auto-ban
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(FetchError::RateLimited {
                endpoint: endpoint.to_string(),
                status:   status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::ServerError {
                endpoint: endpoint.to_string(),
                status:   status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Rejected {
                endpoint: endpoint.to_string(),
                status:   status.as_u16(),
            });
        }

        // read fully first: a drop mid-body is transient, a bad body is not
        let body = resp.text().await.map_err(|e| classify_body(endpoint, e))?;

        serde_json::from_str(&body).map_err(|e| FetchError::malformed(endpoint, e.to_string()))
    }
}

/// Map a failed `send` onto the transient/permanent split. Only timeouts
/// and connection-level failures are worth retrying; redirect loops and
/// anything else reqwest rejects are permanent.
fn classify(endpoint: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::TimedOut { endpoint: endpoint.to_string() }
    } else if err.is_builder() {
        FetchError::InvalidUrl(endpoint.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        FetchError::Disconnected {
            endpoint: endpoint.to_string(),
            reason:   err.to_string(),
        }
    } else {
        FetchError::Request {
            endpoint: endpoint.to_string(),
            reason:   err.to_string(),
        }
    }
}

/// The status line arrived but the body did not: the connection went away
/// mid-response.
fn classify_body(endpoint: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::TimedOut { endpoint: endpoint.to_string() }
    } else {
        FetchError::Disconnected {
            endpoint: endpoint.to_string(),
            reason:   err.to_string(),
        }
    }
}

// ─── Retry Policy ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Upper bound of the uniform delay between attempts.
    pub max_backoff:  Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_backoff:  Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, max_backoff: Duration) -> Self {
        Self { max_attempts, max_backoff }
    }

    /// Uniformly random delay in `[0, max_backoff]`.
    pub fn backoff(&self) -> Duration {
        let max_ms = self.max_backoff.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent.
    pub async fn run<T, F, Fut>(&self, endpoint: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(endpoint, attempt, "Fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    warn!(endpoint, attempts = attempt, error = %e, "Retry budget exhausted");
                    return Err(FetchError::Exhausted {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        last:     Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff();
                    warn!(
                        endpoint,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

// ─── Retrying Client ──────────────────────────────────────────────────────────

/// What exchange adapters hold: a transport plus the policy to retry it with.
#[derive(Clone)]
pub struct RetryingClient {
    transport: Arc<dyn Transport>,
    policy:    RetryPolicy,
}

impl RetryingClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn fetch(&self, endpoint: &str) -> Result<Value, FetchError> {
        self.policy
            .run(endpoint, || self.transport.get(endpoint))
            .await
    }

    /// Like [`fetch`](Self::fetch), but runs `check` on every payload inside
    /// the retry loop. Exchanges that report throttling inside a 200 body
    /// use this so their envelope errors get the same retry treatment.
    pub async fn fetch_checked<F>(&self, endpoint: &str, check: F) -> Result<Value, FetchError>
    where
        F: Fn(&str, Value) -> Result<Value, FetchError> + Send + Sync,
    {
        let check = &check;
        self.policy
            .run(endpoint, move || async move {
                let payload = self.transport.get(endpoint).await?;
                check(endpoint, payload)
            })
            .await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `error` for the first `failures` calls, then returns `{"ok":true}`.
    struct FlakyTransport {
        failures: u32,
        error:    FetchError,
        calls:    AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: u32, error: FetchError) -> Arc<Self> {
            Arc::new(Self { failures, error, calls: AtomicU32::new(0) })
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn get(&self, _endpoint: &str) -> Result<Value, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(self.error.clone())
            } else {
                Ok(json!({ "ok": true }))
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    fn rate_limited() -> FetchError {
        FetchError::RateLimited { endpoint: "https://x".into(), status: 429 }
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let transport = FlakyTransport::new(2, rate_limited());
        let client = RetryingClient::new(transport.clone(), fast_policy(3));

        let payload = client.fetch("https://x").await.unwrap();

        assert_eq!(payload, json!({ "ok": true }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_returns_error_value() {
        let transport = FlakyTransport::new(u32::MAX, rate_limited());
        let client = RetryingClient::new(transport.clone(), fast_policy(3));

        let err = client.fetch("https://x").await.unwrap_err();

        match err {
            FetchError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let transport = FlakyTransport::new(
            u32::MAX,
            FetchError::Rejected { endpoint: "https://x".into(), status: 404 },
        );
        let client = RetryingClient::new(transport.clone(), fast_policy(5));

        let err = client.fetch("https://x").await.unwrap_err();

        assert!(matches!(err, FetchError::Rejected { status: 404, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let transport = FlakyTransport::new(0, rate_limited());
        let client = RetryingClient::new(transport.clone(), fast_policy(0));

        assert!(client.fetch("https://x").await.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_checked_retries_envelope_errors() {
        let transport = FlakyTransport::new(0, rate_limited());
        let client = RetryingClient::new(transport.clone(), fast_policy(3));
        let seen = AtomicU32::new(0);

        let result = client
            .fetch_checked("https://x", |endpoint, payload| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::RateLimited { endpoint: endpoint.into(), status: 200 })
                } else {
                    Ok(payload)
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_stays_within_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(50));
        for _ in 0..200 {
            assert!(policy.backoff() <= Duration::from_millis(50));
        }
        assert_eq!(RetryPolicy::new(3, Duration::ZERO).backoff(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_invalid_url_is_permanent() {
        let transport = HttpTransport::new(reqwest::Client::new(), Duration::from_secs(1));
        let err = transport.get("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(!err.is_transient());
    }
}
