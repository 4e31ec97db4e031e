use pairplan_core::UsageStore;
use pairplan_test_utils::*;
use serde_json::json;

async fn record(app: &TestApp, token: &str) -> serde_json::Value {
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/usage/record",
        Some(token),
        Some(json!({})),
    )
    .await;
    assert_api_ok(status, &body);
    body
}

#[tokio::test]
async fn free_plan_blocks_after_daily_limit() {
    let app = create_test_app().await;
    app.stores
        .usage_store
        .set_subscription("alice", "free")
        .await
        .unwrap();
    let alice = issue_token("alice");

    let (status, body) =
        send_request(&app.router, "GET", "/api/usage/limit", Some(&alice), None).await;
    assert_api_ok(status, &body);
    assert_eq!(body["canGenerate"], true);
    assert_eq!(body["remaining"]["daily"], 3);
    assert_eq!(body["remaining"]["monthly"], 10);
    assert_eq!(body["limits"]["daily"], 3);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["degraded"], false);

    record(&app, &alice).await;
    record(&app, &alice).await;
    let body = record(&app, &alice).await;
    assert_eq!(body["canGenerate"], false);
    assert_eq!(body["remaining"]["daily"], 0);
    assert_eq!(body["used"]["monthly"], 3);
}

#[tokio::test]
async fn record_accepts_artifact_id() {
    let app = create_test_app().await;
    app.stores
        .usage_store
        .set_subscription("alice", "free")
        .await
        .unwrap();

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/usage/record",
        Some(&issue_token("alice")),
        Some(json!({ "artifactId": "plan-7" })),
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["used"]["daily"], 1);

    let listed = app.stores.usage_store.list_usage("alice", 5).await.unwrap();
    assert_eq!(listed[0].plan_id.as_deref(), Some("plan-7"));
}

#[tokio::test]
async fn premium_plan_is_unlimited() {
    let app = create_test_app().await;
    app.stores
        .usage_store
        .set_subscription("alice", "premium")
        .await
        .unwrap();
    let alice = issue_token("alice");
    for _ in 0..5 {
        record(&app, &alice).await;
    }

    let (_, body) =
        send_request(&app.router, "GET", "/api/usage/limit", Some(&alice), None).await;
    assert_eq!(body["canGenerate"], true);
    assert!(body["remaining"]["daily"].is_null());
    assert!(body["limits"]["monthly"].is_null());
}

#[tokio::test]
async fn no_subscription_is_degraded_unlimited() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/usage/limit",
        Some(&issue_token("nobody")),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["canGenerate"], true);
    assert_eq!(body["degraded"], true);
    assert!(body["plan"].is_null());
}
