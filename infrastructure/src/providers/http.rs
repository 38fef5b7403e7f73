//! HTTP plumbing shared by the provider adapters
//!
//! Status classification, transport error mapping and the reachability
//! probe are the same for every backend; only the request/response
//! bodies differ.

use collab_application::{HealthStatus, ProviderError};
use collab_domain::util::truncate_str;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::{Duration, Instant};

/// Used when a 429 carries no usable `retry-after` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest error body echoed back into a `ProviderError`.
const MAX_ERROR_BODY: usize = 512;

/// Map a non-2xx status onto the provider error taxonomy.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let message = truncate(body);
    match status.as_u16() {
        400 | 422 => ProviderError::Validation(vec![message]),
        401 | 403 => ProviderError::Authentication(message),
        408 => ProviderError::Timeout(Duration::ZERO),
        429 => ProviderError::RateLimited {
            retry_after: Some(retry_after(headers).unwrap_or(DEFAULT_RETRY_AFTER)),
        },
        code @ 500..=599 => ProviderError::Server {
            status: code,
            message,
        },
        code => ProviderError::Other(format!("Unexpected status {}: {}", code, message)),
    }
}

/// Parse `retry-after` as delay-seconds. HTTP dates are not honoured.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Map a transport-level failure.
pub fn classify_transport(error: &reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if error.is_decode() {
        ProviderError::Other(format!("Malformed response body: {}", error))
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Join a base URL and an API path without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Send a prepared probe request and turn the answer into a [`HealthStatus`].
///
/// Any 2xx or non-auth 4xx answer proves the backend is reachable.
pub async fn probe(request: reqwest::RequestBuilder) -> HealthStatus {
    let started = Instant::now();
    match request.send().await {
        Ok(response) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            let status = response.status();
            if status.is_success() || reachable_client_error(status) {
                HealthStatus::healthy(latency_ms)
            } else {
                HealthStatus::unhealthy(format!("Health probe returned {}", status))
            }
        }
        Err(e) => HealthStatus::unhealthy(format!("Health probe failed: {}", e)),
    }
}

fn reachable_client_error(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::UNAUTHORIZED
        && status != StatusCode::FORBIDDEN
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    let cut = truncate_str(body, MAX_ERROR_BODY);
    if cut.len() == body.len() {
        body.to_string()
    } else {
        format!("{}...", cut)
    }
}
