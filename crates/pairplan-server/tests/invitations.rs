use chrono::Duration;
use pairplan_core::LinkageStore;
use pairplan_test_utils::*;
use serde_json::json;

async fn create_code(app: &TestApp, token: &str) -> (String, String) {
    let (status, body) =
        send_request(&app.router, "POST", "/api/invitations", Some(token), None).await;
    assert_api_ok(status, &body);
    (
        body["invitationId"].as_str().unwrap().to_string(),
        body["code"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn create_returns_code_and_expiry() {
    let app = create_test_app().await;
    let alice = issue_token("alice");

    let (status, body) =
        send_request(&app.router, "POST", "/api/invitations", Some(&alice), None).await;
    assert_api_ok(status, &body);
    assert_eq!(body["code"].as_str().unwrap().len(), 8);
    assert!(body["invitationId"].is_string());
    assert_eq!(body["expiresAt"], "2024-06-02T09:00:00Z");
}

#[tokio::test]
async fn verify_returns_inviter_profile() {
    let app = create_test_app().await;
    app.stores.seed_profile("alice", "Alice").await;
    let (invitation_id, code) = create_code(&app, &issue_token("alice")).await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": code })),
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body["invitationId"], invitation_id);
    assert_eq!(body["fromUserId"], "alice");
    assert_eq!(body["fromUserProfile"]["name"], "Alice");
    assert_eq!(body["fromUserProfile"]["userId"], "alice");
}

#[tokio::test]
async fn verify_own_code_is_self_invite() {
    let app = create_test_app().await;
    let alice = issue_token("alice");
    let (_, code) = create_code(&app, &alice).await;

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&alice),
        Some(json!({ "code": code })),
    )
    .await;
    assert_api_error(status, &body, 400, "SelfInvite");
}

#[tokio::test]
async fn verify_unknown_code_is_not_found() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": "ZZZZ9999" })),
    )
    .await;
    assert_api_error(status, &body, 404, "NotFound");
}

#[tokio::test]
async fn verify_blank_code_is_invalid_request() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": "  " })),
    )
    .await;
    assert_api_error(status, &body, 400, "InvalidRequest");
}

#[tokio::test]
async fn verify_after_expiry_is_gone() {
    let app = create_test_app().await;
    let (invitation_id, code) = create_code(&app, &issue_token("alice")).await;

    app.clock.advance(Duration::hours(24) + Duration::seconds(1));
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": code })),
    )
    .await;
    assert_api_error(status, &body, 410, "InvitationExpired");

    let stored = app
        .stores
        .linkage_store
        .get_invitation(&invitation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status.as_str(), "EXPIRED");
}

#[tokio::test]
async fn current_tracks_newest_open_invitation() {
    let app = create_test_app().await;
    let alice = issue_token("alice");

    let (status, body) =
        send_request(&app.router, "GET", "/api/invitations/current", Some(&alice), None).await;
    assert_api_ok(status, &body);
    assert!(body["invitation"].is_null());

    let (first_id, first_code) = create_code(&app, &alice).await;
    let (second_id, _) = create_code(&app, &alice).await;
    assert_ne!(first_id, second_id);

    let (_, body) =
        send_request(&app.router, "GET", "/api/invitations/current", Some(&alice), None).await;
    assert_eq!(body["invitation"]["invitationId"], second_id);
    assert_eq!(body["invitation"]["status"], "PENDING");

    // The superseded code no longer verifies.
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": first_code })),
    )
    .await;
    assert_api_error(status, &body, 410, "InvitationExpired");
}
