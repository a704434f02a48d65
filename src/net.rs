//! SOCKS5 proxy liveness checks.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Errors raised by proxy liveness checks.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProxyCheckError {
    /// Raised when the proxy address does not form a usable client.
    #[error("invalid proxy address {proxy_addr}: {message}")]
    InvalidProxy {
        /// Address that was rejected.
        proxy_addr: String,
        /// Message reported by the HTTP client.
        message: String,
    },
    /// Raised when the probe request through the proxy failed.
    #[error("probe through {proxy_addr} failed: {message}")]
    ProbeFailed {
        /// Proxy the probe was routed through.
        proxy_addr: String,
        /// Message reported by the HTTP client.
        message: String,
    },
    /// Raised when every attempt of a bounded wait failed.
    #[error("proxy {proxy_addr} not reachable after {attempts} attempts")]
    Exhausted {
        /// Proxy that never became reachable.
        proxy_addr: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Fetches `test_url` through the SOCKS5 proxy at `proxy_addr`
/// (`host:port`), returning an error when the proxy or the probe target is
/// unreachable.
///
/// # Errors
///
/// Returns [`ProxyCheckError`] when the client cannot be built or the probe
/// request fails.
pub async fn check_socks5_proxy(proxy_addr: &str, test_url: &str) -> Result<(), ProxyCheckError> {
    let proxy = reqwest::Proxy::all(format!("socks5://{proxy_addr}")).map_err(|err| {
        ProxyCheckError::InvalidProxy {
            proxy_addr: proxy_addr.to_owned(),
            message: err.to_string(),
        }
    })?;
    let client = reqwest::Client::builder()
        .proxy(proxy)
        .build()
        .map_err(|err| ProxyCheckError::InvalidProxy {
            proxy_addr: proxy_addr.to_owned(),
            message: err.to_string(),
        })?;

    let response =
        client
            .get(test_url)
            .send()
            .await
            .map_err(|err| ProxyCheckError::ProbeFailed {
                proxy_addr: proxy_addr.to_owned(),
                message: err.to_string(),
            })?;
    response
        .bytes()
        .await
        .map_err(|err| ProxyCheckError::ProbeFailed {
            proxy_addr: proxy_addr.to_owned(),
            message: err.to_string(),
        })?;
    Ok(())
}

/// Probes the proxy up to `max_attempts` times, sleeping `interval` between
/// attempts, and returns as soon as one probe succeeds.
///
/// # Errors
///
/// Returns [`ProxyCheckError::Exhausted`] when no attempt succeeded.
pub async fn wait_for_socks5_proxy(
    proxy_addr: &str,
    test_url: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<(), ProxyCheckError> {
    for attempt in 1..=max_attempts {
        match check_socks5_proxy(proxy_addr, test_url).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(attempt, error = %err, "proxy probe failed");
            }
        }
        if attempt < max_attempts {
            sleep(interval).await;
        }
    }
    Err(ProxyCheckError::Exhausted {
        proxy_addr: proxy_addr.to_owned(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_proxy_fails_the_probe() {
        let result = check_socks5_proxy("127.0.0.1:1", "http://127.0.0.1:1/").await;
        assert!(matches!(result, Err(ProxyCheckError::ProbeFailed { .. })));
    }

    #[tokio::test]
    async fn bounded_wait_reports_exhaustion() {
        let result = wait_for_socks5_proxy(
            "127.0.0.1:1",
            "http://127.0.0.1:1/",
            Duration::from_millis(1),
            2,
        )
        .await;
        assert!(matches!(
            result,
            Err(ProxyCheckError::Exhausted { attempts: 2, .. })
        ));
    }
}
