//! Throttling for the credential endpoints.
//!
//! Signup and login are the only unauthenticated writes, so they get a
//! limiter keyed per client. One caller hammering the login form burns
//! its own quota without locking everyone else out.

use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Throttle applied to signup and login attempts.
pub struct CredentialThrottle {
    /// Attempts allowed per client per minute.
    pub attempts_per_minute: u32,
}

impl Default for CredentialThrottle {
    fn default() -> Self {
        Self {
            attempts_per_minute: 100,
        }
    }
}

/// Per-client limiter over the credential endpoints.
pub type CredentialRateLimiter =
    Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>;

pub fn create_credential_limiter(config: CredentialThrottle) -> CredentialRateLimiter {
    let quota = Quota::per_minute(
        NonZeroU32::new(config.attempts_per_minute).expect("Attempts per minute must be non-zero"),
    );
    Arc::new(RateLimiter::keyed(quota))
}

/// Best-effort client identity: proxy header first, then the peer
/// address, then a shared bucket.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware guarding signup and login.
pub async fn throttle_credentials(
    limiter: CredentialRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match limiter.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Credential attempt limit hit for {}", key);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many attempts. Please try again later."
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_quota_is_per_client() {
        let limiter = create_credential_limiter(CredentialThrottle {
            attempts_per_minute: 2,
        });

        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_ok());
        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_ok());
        assert!(limiter.check_key(&"10.0.0.1".to_string()).is_err());

        // A different client still has its full quota.
        assert!(limiter.check_key(&"10.0.0.2".to_string()).is_ok());
    }

    #[test]
    fn test_client_key_prefers_forwarded_header() {
        let request = Request::builder()
            .uri("/auth/login")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back_to_shared_bucket() {
        let request = Request::builder()
            .uri("/auth/login")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "unknown");
    }

    #[test]
    fn test_default_throttle() {
        let config = CredentialThrottle::default();
        assert_eq!(config.attempts_per_minute, 100);
    }
}
