//! Shared HTTP Client Module
//!
//! Provides a global, lazy-initialized HTTP client with connection pooling for all
//! inference providers. Reusing one client keeps TLS sessions and idle connections
//! warm across the many small naming requests a batch produces.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Default per-request timeout for inference calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Global HTTP client for inference calls
///
/// - 60s timeout: the only cancellation mechanism for an in-flight call
/// - 16 idle connections per host for parallel batch workers
/// - 90s idle timeout to balance resource usage and performance
pub static INFERENCE_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .expect("Failed to create inference HTTP client")
});

/// Build a client with a custom request timeout
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
}

/// Get the global inference HTTP client
#[inline]
pub fn inference_client() -> &'static Client {
    &INFERENCE_CLIENT
}
