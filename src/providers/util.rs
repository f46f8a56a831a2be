//! Shared fetch plumbing for provider adapters: HTTP error classification
//! and a retrying, endpoint-variant-aware fetch loop.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum length of the response-body excerpt carried in a [`FetchError`].
const BODY_SNIPPET_MAX: usize = 500;

/// Coarse classification of an upstream HTTP failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    Auth,
    BadRequest,
    Server,
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::RateLimit => write!(f, "rate limited"),
            ErrorClass::Auth => write!(f, "auth failed"),
            ErrorClass::BadRequest => write!(f, "bad request"),
            ErrorClass::Server => write!(f, "server error"),
            ErrorClass::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Maps an HTTP status to its failure class. 409 is included with 429
/// because one upstream signals quota exhaustion with it.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        409 | 429 => ErrorClass::RateLimit,
        401 | 403 => ErrorClass::Auth,
        400 | 404 => ErrorClass::BadRequest,
        s if s >= 500 => ErrorClass::Server,
        _ => ErrorClass::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The upstream answered with a non-success status.
    Http(ErrorClass),
    /// The request never completed (DNS, connect, timeout).
    Network,
    /// Every endpoint answered but none carried usable observations.
    NoData,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Http(class) => write!(f, "{class}"),
            FetchErrorKind::Network => write!(f, "network error"),
            FetchErrorKind::NoData => write!(f, "no data"),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Aggregated failure of one provider fetch, carrying the last attempt's
/// classification and diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{kind} from {endpoint}{}", fmt_status(.status))]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub status: Option<u16>,
    pub endpoint: String,
    /// Response body truncated to 500 chars, for operator diagnostics.
    pub body: String,
}

impl FetchError {
    pub fn http(status: u16, endpoint: &str, body: &str) -> Self {
        FetchError {
            kind: FetchErrorKind::Http(classify_status(status)),
            status: Some(status),
            endpoint: endpoint.to_string(),
            body: truncate_body(body),
        }
    }

    pub fn network(endpoint: &str, err: &reqwest::Error) -> Self {
        FetchError {
            kind: FetchErrorKind::Network,
            status: None,
            endpoint: endpoint.to_string(),
            body: err.to_string(),
        }
    }

    pub fn no_data(endpoint: &str) -> Self {
        FetchError {
            kind: FetchErrorKind::NoData,
            status: None,
            endpoint: endpoint.to_string(),
            body: String::new(),
        }
    }

    pub fn class(&self) -> Option<ErrorClass> {
        match self.kind {
            FetchErrorKind::Http(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.class() == Some(ErrorClass::RateLimit)
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_MAX).collect()
}

/// Retry schedule for one provider fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per endpoint, including the first.
    pub max_retries: u32,
    /// First backoff sleep; doubles on each further rate-limit hit.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Fetches from `endpoints` in order until one yields a parseable, non-empty
/// payload.
///
/// Per endpoint: a rate-limit response sleeps `base_delay * 2^(attempt-1)`
/// and retries the same endpoint while attempts remain; auth and bad-request
/// responses fail the whole provider immediately (no other endpoint can
/// recover them); server, unknown and network failures move on to the next
/// endpoint. `parse` returning `None` (unparseable or empty body) also moves
/// on. Exhaustion returns the last failure.
pub async fn fetch_with_fallback<T>(
    client: &reqwest::Client,
    endpoints: &[String],
    policy: &RetryPolicy,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, FetchError> {
    let mut last_error: Option<FetchError> = None;

    'endpoints: for endpoint in endpoints {
        let mut attempt: u32 = 1;
        loop {
            let response = match client.get(endpoint.as_str()).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "request failed");
                    last_error = Some(FetchError::network(endpoint, &e));
                    continue 'endpoints;
                }
            };

            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            if !(200..300).contains(&status) {
                let class = classify_status(status);
                match class {
                    ErrorClass::RateLimit if attempt < policy.max_retries => {
                        let delay = policy.base_delay * 2u32.pow(attempt - 1);
                        debug!(
                            endpoint = %endpoint,
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    ErrorClass::Auth | ErrorClass::BadRequest => {
                        // Not recoverable by retrying or switching endpoints.
                        return Err(FetchError::http(status, endpoint, &body));
                    }
                    _ => {
                        debug!(endpoint = %endpoint, status, %class, "moving to next endpoint");
                        last_error = Some(FetchError::http(status, endpoint, &body));
                        continue 'endpoints;
                    }
                }
            }

            match parse(&body) {
                Some(payload) => return Ok(payload),
                None => {
                    debug!(endpoint = %endpoint, "response had no usable observations");
                    last_error = Some(FetchError::no_data(endpoint));
                    continue 'endpoints;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| FetchError::no_data("")))
}
