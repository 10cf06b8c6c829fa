// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-client request limiting for the `/api` routes
//!
//! Clients are keyed by peer IP (or the first `X-Forwarded-For` hop when no
//! peer address is attached). Each client may burst up to `max_requests`,
//! refilled evenly over the window.

use crate::domain::config::RateLimitConfig;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use serde_json::json;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

pub struct ApiRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
    window: Duration,
}

impl ApiRateLimiter {
    /// `None` when limiting is disabled or the quota is zero
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    pub fn new(max_requests: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(max_requests)?;
        let quota = Quota::with_period(window / max_requests)?.allow_burst(burst);
        let clock = DefaultClock::default();
        Some(Self {
            limiter: RateLimiter::new(quota, DefaultKeyedStateStore::default(), clock.clone()),
            clock,
            window,
        })
    }

    /// Returns how long the client must wait when over quota
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    fn rejection(&self, wait: Duration) -> Response {
        let retry_secs = wait.as_secs().max(1);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many requests, please try again later.",
                "retryAfter": describe_window(self.window),
            })),
        )
            .into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

pub async fn limit_requests(
    State(limiter): State<Arc<ApiRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!(client = %client, retry_after_secs = wait.as_secs(), "Rate limit exceeded");
            limiter.rejection(wait)
        }
    }
}

fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    #[test]
    fn test_quota_exhausted_per_client() {
        let limiter = ApiRateLimiter::new(2, Duration::from_secs(900)).unwrap();
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());

        let wait = limiter.check("10.0.0.1").unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(450));

        assert!(limiter.check("10.0.0.2").is_ok());
    }

    #[test]
    fn test_disabled_or_zero_quota_builds_nothing() {
        let mut config = RateLimitConfig::default();
        assert!(ApiRateLimiter::from_config(&config).is_some());

        config.max_requests = 0;
        assert!(ApiRateLimiter::from_config(&config).is_none());

        config.max_requests = 100;
        config.enabled = false;
        assert!(ApiRateLimiter::from_config(&config).is_none());
    }

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(Duration::from_secs(900)), "15 minutes");
        assert_eq!(describe_window(Duration::from_secs(60)), "1 minute");
        assert_eq!(describe_window(Duration::from_secs(90)), "90 seconds");
    }

    #[test]
    fn test_client_key_sources() {
        let forwarded = http::Request::builder()
            .header(FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&forwarded), "203.0.113.7");

        let mut connected = http::Request::builder()
            .header(FORWARDED_FOR, "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        connected
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 5000))));
        assert_eq!(client_key(&connected), "192.168.1.4");

        let bare = http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
