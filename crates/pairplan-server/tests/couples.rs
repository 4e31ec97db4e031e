use pairplan_test_utils::*;
use serde_json::{Value, json};

/// Alice invites, Bob verifies. Returns the invitation id.
async fn invite_and_verify(app: &TestApp, from: &str, to: &str) -> String {
    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations",
        Some(&issue_token(from)),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    let invitation_id = body["invitationId"].as_str().unwrap().to_string();
    let code = body["code"].as_str().unwrap().to_string();

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token(to)),
        Some(json!({ "code": code })),
    )
    .await;
    assert_api_ok(status, &body);
    invitation_id
}

async fn connect(app: &TestApp, invitation_id: &str, from: &str, caller: &str) -> (u16, Value) {
    send_request(
        &app.router,
        "POST",
        "/api/couples",
        Some(&issue_token(caller)),
        Some(json!({ "invitationId": invitation_id, "fromUserId": from })),
    )
    .await
}

#[tokio::test]
async fn invite_verify_connect_links_both_users() {
    let app = create_test_app().await;
    app.stores.seed_profile("alice", "Alice").await;
    app.stores.seed_profile("bob", "Bob").await;

    let invitation_id = invite_and_verify(&app, "alice", "bob").await;
    let (status, body) = connect(&app, &invitation_id, "alice", "bob").await;
    assert_api_ok(status, &body);
    let couple_id = body["coupleId"].as_str().unwrap().to_string();

    let (status, alice) = send_request(
        &app.router,
        "GET",
        "/api/couples/status",
        Some(&issue_token("alice")),
        None,
    )
    .await;
    assert_api_ok(status, &alice);
    assert_eq!(alice["isLinked"], true);
    assert_eq!(alice["coupleId"], couple_id);
    assert_eq!(alice["partnerUserId"], "bob");
    assert_eq!(alice["partnerProfile"]["name"], "Bob");

    let (_, bob) = send_request(
        &app.router,
        "GET",
        "/api/couples/status",
        Some(&issue_token("bob")),
        None,
    )
    .await;
    assert_eq!(bob["isLinked"], true);
    assert_eq!(bob["partnerProfile"]["name"], "Alice");
}

#[tokio::test]
async fn unlinked_status_omits_couple_fields() {
    let app = create_test_app().await;
    let (status, body) = send_request(
        &app.router,
        "GET",
        "/api/couples/status",
        Some(&issue_token("carol")),
        None,
    )
    .await;
    assert_api_ok(status, &body);
    assert_eq!(body, json!({ "isLinked": false }));
}

#[tokio::test]
async fn second_connect_is_consumed() {
    let app = create_test_app().await;
    let invitation_id = invite_and_verify(&app, "alice", "bob").await;

    let (status, _) = connect(&app, &invitation_id, "alice", "bob").await;
    assert_eq!(status, 200);
    let (status, body) = connect(&app, &invitation_id, "alice", "bob").await;
    assert_api_error(status, &body, 409, "InvitationAlreadyConsumed");
}

#[tokio::test]
async fn connect_before_verify_is_invalid_state() {
    let app = create_test_app().await;
    let (_, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations",
        Some(&issue_token("alice")),
        None,
    )
    .await;
    let invitation_id = body["invitationId"].as_str().unwrap().to_string();

    let (status, body) = connect(&app, &invitation_id, "alice", "bob").await;
    assert_api_error(status, &body, 409, "InvalidState");
}

#[tokio::test]
async fn connect_by_someone_other_than_verifier_is_invalid_state() {
    let app = create_test_app().await;
    let invitation_id = invite_and_verify(&app, "alice", "bob").await;

    let (status, body) = connect(&app, &invitation_id, "alice", "mallory").await;
    assert_api_error(status, &body, 409, "InvalidState");
}

#[tokio::test]
async fn linked_user_cannot_verify_another_code() {
    let app = create_test_app().await;
    let invitation_id = invite_and_verify(&app, "alice", "bob").await;
    connect(&app, &invitation_id, "alice", "bob").await;

    let (_, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations",
        Some(&issue_token("carol")),
        None,
    )
    .await;
    let code = body["code"].as_str().unwrap().to_string();

    let (status, body) = send_request(
        &app.router,
        "POST",
        "/api/invitations/verify",
        Some(&issue_token("bob")),
        Some(json!({ "code": code })),
    )
    .await;
    assert_api_error(status, &body, 409, "AlreadyLinked");
}

#[tokio::test]
async fn unknown_invitation_is_not_found() {
    let app = create_test_app().await;
    let (status, body) = connect(&app, "no-such-invitation", "alice", "bob").await;
    assert_api_error(status, &body, 404, "NotFound");
}

#[tokio::test]
async fn concurrent_connects_link_exactly_once() {
    let app = create_test_app().await;
    let invitation_id = invite_and_verify(&app, "alice", "bob").await;

    let (a, b) = futures::join!(
        connect(&app, &invitation_id, "alice", "bob"),
        connect(&app, &invitation_id, "alice", "bob"),
    );

    let statuses = [a.0, b.0];
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 1);
}
