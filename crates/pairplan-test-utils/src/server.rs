use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::HeaderMap;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use pairplan_core::config::{
    AppConfig, DatabaseConfig, InvitationConfig, JwtConfig, LoggingConfig, QuotaConfig,
    RateLimitConfig,
};
use pairplan_core::ManualClock;
use pairplan_quota::{FixedWindowLimiter, MemoryRateLimitStore};
use pairplan_server::{AppState, build_router};

use crate::stores::{TestStores, create_test_stores};

pub const TEST_ACCESS_SECRET: &str = "test-access-secret-at-least-32-chars-long";

pub fn create_test_config() -> AppConfig {
    AppConfig {
        port: 0,
        jwt: JwtConfig {
            access_secret: TEST_ACCESS_SECRET.to_string(),
        },
        database: DatabaseConfig {
            url: String::new(), // not used; stores are pre-connected
        },
        invitation: InvitationConfig::default(),
        quota: QuotaConfig::default(),
        rate_limit: RateLimitConfig::default(),
        logging: LoggingConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub stores: TestStores,
    /// Drives every time-dependent path in the router.
    pub clock: Arc<ManualClock>,
}

pub async fn create_test_app() -> TestApp {
    let stores = create_test_stores().await;
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ));
    let config = create_test_config();
    let rate_limiter = FixedWindowLimiter::new(
        Arc::new(MemoryRateLimitStore::new(config.rate_limit.memory_capacity)),
        clock.clone(),
    );

    let state = AppState {
        linkage_store: stores.linkage_store.clone(),
        usage_store: stores.usage_store.clone(),
        config: Arc::new(config),
        clock: clock.clone(),
        rate_limiter,
    };

    TestApp {
        router: build_router(state),
        stores,
        clock,
    }
}

/// A valid bearer token for `user_id`.
pub fn issue_token(user_id: &str) -> String {
    pairplan_crypto::issue_access_token(
        user_id,
        TEST_ACCESS_SECRET,
        chrono::Utc::now(),
        chrono::Duration::hours(2),
    )
    .expect("failed to create test token")
}

/// Send a request through the router and return (status, body_json).
pub async fn send_request(
    router: &Router,
    method: &str,
    uri: &str,
    auth_token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let (status, _, json) =
        send_request_with_headers(router, method, uri, auth_token, &[], body).await;
    (status, json)
}

/// Like [`send_request`], with extra request headers, also returning the
/// response headers.
pub async fn send_request_with_headers(
    router: &Router,
    method: &str,
    uri: &str,
    auth_token: Option<&str>,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (u16, HeaderMap, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let req_body = match body {
        Some(b) => Body::from(serde_json::to_vec(&b).unwrap()),
        None => Body::empty(),
    };

    let req = builder.body(req_body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let resp_headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).to_string(),
        ))
    };

    (status, resp_headers, json)
}
