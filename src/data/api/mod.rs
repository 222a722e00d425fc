//! NBA stats API access
//!
//! `StatsSource` is the seam between ingestion and the network: the HTTP
//! client implements it, tests substitute canned responses.

pub mod client;
pub mod endpoints;
pub mod resultset;
pub mod teams;

pub use client::StatsClient;
pub use resultset::{ResultSet, Row, StatsResponse};

use crate::{HoopsError, Result};
use std::time::Duration;

/// HTTP statuses worth retrying
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Anything that can answer a stats endpoint query
pub trait StatsSource {
    /// Fetch an endpoint (e.g. `scoreboardv2`) with query parameters
    fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<StatsResponse>;
}

/// Whether an error is transient and the request may succeed on retry
pub fn is_retryable(error: &HoopsError) -> bool {
    match error {
        HoopsError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        HoopsError::Api {
            status: Some(status),
            ..
        } => RETRY_STATUSES.contains(status),
        _ => false,
    }
}

/// Retry an operation with exponential backoff (`base_delay * 2^attempt`).
/// Only errors accepted by `retryable` are retried.
pub fn with_retry<T, F>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    retryable: impl Fn(&HoopsError) -> bool,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && retryable(&e) => {
                let delay = base_delay * 2u32.pow(attempt);
                log::warn!(
                    "Attempt {} failed: {} (retrying in {:?})",
                    attempt + 1,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Serves canned JSON bodies keyed by endpoint
    #[derive(Default)]
    pub(crate) struct CannedSource {
        responses: HashMap<String, String>,
    }

    impl CannedSource {
        pub(crate) fn with(mut self, endpoint: &str, body: &str) -> Self {
            self.responses.insert(endpoint.to_string(), body.to_string());
            self
        }
    }

    impl StatsSource for CannedSource {
        fn fetch(&self, endpoint: &str, _params: &[(&str, String)]) -> Result<StatsResponse> {
            let body = self.responses.get(endpoint).ok_or_else(|| HoopsError::Api {
                endpoint: endpoint.to_string(),
                status: Some(404),
                message: "no canned response".to_string(),
            })?;
            StatsResponse::parse(endpoint, body)
        }
    }

    fn api_error(status: u16) -> HoopsError {
        HoopsError::Api {
            endpoint: "scoreboardv2".to_string(),
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    #[test]
    fn test_retry_recovers_from_transient_errors() {
        let calls = Cell::new(0);
        let result = with_retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(api_error(503))
                } else {
                    Ok(calls.get())
                }
            },
            3,
            Duration::from_millis(1),
            is_retryable,
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(api_error(429))
            },
            2,
            Duration::from_millis(1),
            is_retryable,
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_no_retry_on_client_error() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(api_error(400))
            },
            3,
            Duration::from_millis(1),
            is_retryable,
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
