use pairplan_test_utils::{assert_api_ok, create_test_app, send_request};

#[tokio::test]
async fn health_returns_200_with_version() {
    let app = create_test_app().await;
    let (status, body) = send_request(&app.router, "GET", "/health", None, None).await;
    assert_api_ok(status, &body);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], "0.1.0");
}
