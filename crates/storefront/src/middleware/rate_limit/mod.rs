//! Per-endpoint-class rate limiting keyed by client IP.
//!
//! Each endpoint class has its own quota:
//!
//! | Class | Requests per minute |
//! |---|---|
//! | `auth` | 5 |
//! | `contact` | 3 |
//! | `search` | 30 |
//! | `products` | 60 |
//! | `orders` | 10 |
//! | `general` | 100 |
//!
//! With `UPSTASH_REDIS_REST_URL` configured the counters live in Redis and
//! are shared by every replica. Otherwise each process limits on its own.
//! If Redis cannot be reached the request is allowed.

mod memory;
mod redis;
mod window;

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

pub use memory::MemoryLimiter;
pub use redis::{RedisRestError, RedisRestLimiter};
pub use window::{RateLimitOutcome, SlidingWindow};

use crate::error::AppError;

const WINDOW: Duration = Duration::from_secs(60);

/// Endpoint classes with independent quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitClass {
    Auth,
    Contact,
    Search,
    Products,
    Orders,
    General,
}

impl LimitClass {
    pub const ALL: [Self; 6] = [
        Self::Auth,
        Self::Contact,
        Self::Search,
        Self::Products,
        Self::Orders,
        Self::General,
    ];

    /// Name used in counter keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Contact => "contact",
            Self::Search => "search",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::General => "general",
        }
    }

    #[must_use]
    pub const fn window(self) -> SlidingWindow {
        let limit = match self {
            Self::Auth => 5,
            Self::Contact => 3,
            Self::Search => 30,
            Self::Products => 60,
            Self::Orders => 10,
            Self::General => 100,
        };
        SlidingWindow::new(limit, WINDOW)
    }
}

/// Where counters are kept.
#[derive(Debug)]
pub enum RateLimitBackend {
    /// Shared counters in a hosted Redis.
    Redis(RedisRestLimiter),
    /// One `governor` limiter per class in this process.
    Memory(HashMap<LimitClass, MemoryLimiter>),
}

/// Checks requests against their class quota.
#[derive(Debug)]
pub struct RateLimiter {
    backend: RateLimitBackend,
}

impl RateLimiter {
    #[must_use]
    pub fn redis(limiter: RedisRestLimiter) -> Self {
        Self {
            backend: RateLimitBackend::Redis(limiter),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let limiters = LimitClass::ALL
            .into_iter()
            .map(|class| (class, MemoryLimiter::new(class.window())))
            .collect();
        Self {
            backend: RateLimitBackend::Memory(limiters),
        }
    }

    /// Backend name, for startup logs.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            RateLimitBackend::Redis(_) => "redis",
            RateLimitBackend::Memory(_) => "memory",
        }
    }

    /// Count a request from `ip` against `class`.
    ///
    /// Never fails: backend errors are logged and the request is allowed.
    pub async fn check(&self, class: LimitClass, ip: IpAddr) -> RateLimitOutcome {
        let window = class.window();
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);

        match &self.backend {
            RateLimitBackend::Redis(redis) => {
                match redis
                    .check(class.as_str(), &ip.to_string(), &window, now_ms)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            class = class.as_str(),
                            "Rate limiter unavailable, allowing request"
                        );
                        RateLimitOutcome::fail_open(window.limit, window.reset_at(now_ms))
                    }
                }
            }
            RateLimitBackend::Memory(limiters) => match limiters.get(&class) {
                Some(limiter) => limiter.check(ip, now_ms),
                None => RateLimitOutcome::fail_open(window.limit, window.reset_at(now_ms)),
            },
        }
    }
}

/// Middleware state: the shared limiter plus the class of the routes it guards.
#[derive(Clone)]
pub struct ClassLimiter {
    limiter: Arc<RateLimiter>,
    class: LimitClass,
}

impl ClassLimiter {
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>, class: LimitClass) -> Self {
        Self { limiter, class }
    }
}

/// Rate limiting middleware.
///
/// Use with `axum::middleware::from_fn_with_state(ClassLimiter::new(..), enforce)`.
pub async fn enforce(State(ctx): State<ClassLimiter>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let outcome = ctx.limiter.check(ctx.class, ip).await;

    if !outcome.success {
        tracing::warn!(client_ip = %ip, class = ctx.class.as_str(), "Rate limit exceeded");
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut response = AppError::RateLimited.into_response();
        apply_headers(response.headers_mut(), &outcome);
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from(outcome.retry_after_secs(now_ms)),
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &outcome);
    response
}

fn apply_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(outcome.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(outcome.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(outcome.reset),
    );
}

/// Real client IP behind Cloudflare and Fly.io.
///
/// Checks `CF-Connecting-IP`, the first `X-Forwarded-For` entry,
/// `X-Real-IP` and `Fly-Client-IP` in that order, then the socket peer.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let header = |name: &str| -> Option<IpAddr> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    };

    header("cf-connecting-ip")
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse().ok())
        })
        .or_else(|| header("x-real-ip"))
        .or_else(|| header("fly-client-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_client_ip_prefers_cloudflare() {
        let h = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&h, None), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_first_forwarded_entry() {
        let h = headers(&[("x-forwarded-for", " 198.51.100.1 , 10.0.0.1")]);
        assert_eq!(client_ip(&h, None), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_fallback_order() {
        let h = headers(&[("fly-client-ip", "2001:db8::1"), ("x-real-ip", "192.0.2.4")]);
        assert_eq!(client_ip(&h, None), Some("192.0.2.4".parse().unwrap()));

        let h = headers(&[("fly-client-ip", "2001:db8::1")]);
        assert_eq!(client_ip(&h, None), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_garbage_falls_through_to_peer() {
        let h = headers(&[("cf-connecting-ip", "not-an-ip")]);
        let peer: SocketAddr = "192.0.2.9:4444".parse().unwrap();
        assert_eq!(client_ip(&h, Some(peer)), Some(peer.ip()));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_class_quotas() {
        assert_eq!(LimitClass::Auth.window().limit, 5);
        assert_eq!(LimitClass::Contact.window().limit, 3);
        assert_eq!(LimitClass::Search.window().limit, 30);
        assert_eq!(LimitClass::Products.window().limit, 60);
        assert_eq!(LimitClass::Orders.window().limit, 10);
        assert_eq!(LimitClass::General.window().limit, 100);
        for class in LimitClass::ALL {
            assert_eq!(class.window().window, Duration::from_secs(60));
        }
    }

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                ClassLimiter::new(limiter, LimitClass::Contact),
                enforce,
            ))
    }

    fn request(ip: &'static str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_sets_headers_and_rejects_with_429() {
        let limiter = Arc::new(RateLimiter::in_memory());

        for expected_remaining in ["2", "1", "0"] {
            let response = app(limiter.clone())
                .oneshot(request("203.0.113.50"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "3");
            assert_eq!(
                response.headers()["x-ratelimit-remaining"],
                expected_remaining
            );
            assert!(response.headers().contains_key("x-ratelimit-reset"));
        }

        let response = app(limiter.clone())
            .oneshot(request("203.0.113.50"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);

        let other = app(limiter).oneshot(request("203.0.113.51")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_open() {
        let config = crate::config::RedisRestConfig {
            url: url::Url::parse("http://127.0.0.1:9").unwrap(),
            token: secrecy::SecretString::from("AXk3Jq9LmP2vR8tZ"),
        };
        let redis = RedisRestLimiter::new(reqwest::Client::new(), &config).unwrap();
        let limiter = RateLimiter::redis(redis);

        let outcome = limiter
            .check(LimitClass::Auth, "192.0.2.1".parse().unwrap())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.limit, 5);
    }
}
