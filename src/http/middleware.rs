//! Rate-limit gate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::ratelimit::{Decision, Quota, RateLimiter};

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const WINDOW_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-window");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Count the request against its rule. Over the limit, answer 429 without
/// reaching the handler.
pub async fn rate_limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let client = client_id(&req);
    let path = req.uri().path().to_owned();

    match limiter.check(&client, &path) {
        Decision::Unlimited => next.run(req).await,
        Decision::Allowed(quota) => {
            let mut response = next.run(req).await;
            quota_headers(response.headers_mut(), &quota);
            response
        }
        Decision::Limited(quota) => too_many_requests(&quota),
    }
}

/// First `X-Forwarded-For` entry, else the peer address, else `unknown`.
pub fn client_id(req: &Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn too_many_requests(quota: &Quota) -> Response {
    let retry_after = quota.retry_after_secs();
    let body = json!({
        "error": "rate_limit_exceeded",
        "message": format!("Too many requests. Try again in {retry_after} seconds."),
        "retry_after": retry_after,
        "remaining_requests": 0,
        "limit": quota.limit,
        "window_seconds": quota.window_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    quota_headers(headers, quota);
    headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(quota.limit));
    headers.insert(WINDOW_HEADER, HeaderValue::from(quota.window_secs));
    headers.insert(REMAINING_HEADER, HeaderValue::from(quota.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(reset_epoch(quota)));
}

/// Unix time, in whole seconds rounded up, when the oldest counted request
/// leaves the window.
fn reset_epoch(quota: &Quota) -> u64 {
    let at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        + quota.reset_after;
    at.as_secs() + u64::from(at.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::Duration;

    #[test]
    fn test_client_id_sources() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&req), "10.0.0.1");

        let mut req = axum::http::Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 4321))));
        assert_eq!(client_id(&req), "192.168.1.7");

        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_id(&req), "unknown");
    }

    #[test]
    fn test_reset_is_in_the_future() {
        let quota = Quota {
            limit: 1,
            window_secs: 60,
            remaining: 0,
            reset_after: Duration::from_secs(30),
        };
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let reset = reset_epoch(&quota);
        assert!(reset >= now + 30 && reset <= now + 32);
    }
}
