//! Integration tests for resource access control as observed through push:
//! permission levels, org roles, and tenant scoping.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use common::fixtures::{add_member, grant_permission, provision_tenant};
use serde_json::{Value, json};
use tack_core::access::{OrgRole, PermissionLevel};
use tower::ServiceExt;
use uuid::Uuid;

/// Helper to make JSON requests.
async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Push one mutation and return its outcome object.
async fn push_one(
    server: &TestServer,
    token: &str,
    group: &str,
    id: i64,
    client_id: &str,
    name: &str,
    args: Value,
) -> Value {
    let body = json!({
        "clientGroupID": group,
        "mutations": [{ "id": id, "clientID": client_id, "name": name, "args": args }],
    });
    let (status, body) =
        json_request(&server.router, "POST", "/sync/push", Some(body), Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    body["outcomes"][0].clone()
}

fn assert_denied(outcome: &Value) {
    assert_eq!(outcome["outcome"].as_str(), Some("rejected"), "{outcome}");
    assert_eq!(outcome["code"].as_str(), Some("permission_denied"));
}

fn assert_applied(outcome: &Value) {
    assert_eq!(outcome["outcome"].as_str(), Some("applied"), "{outcome}");
}

#[tokio::test]
async fn test_member_without_grant_cannot_touch_board() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (_, intruder_token) = add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let outcome = push_one(
        &server,
        &owner.token,
        "group-a",
        1,
        "tab-a",
        "createBoard",
        json!({ "id": board_id, "name": "Private" }),
    )
    .await;
    assert_applied(&outcome);

    let outcome = push_one(
        &server,
        &intruder_token,
        "group-b",
        1,
        "tab-b",
        "createColumn",
        json!({ "id": Uuid::new_v4(), "boardID": board_id, "name": "Sneaky" }),
    )
    .await;
    assert_denied(&outcome);
}

#[tokio::test]
async fn test_viewer_level_cannot_edit() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (viewer_id, viewer_token) =
        add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let outcome = push_one(
        &server,
        &owner.token,
        "group-a",
        1,
        "tab-a",
        "createBoard",
        json!({ "id": board_id, "name": "Shared" }),
    )
    .await;
    assert_applied(&outcome);

    grant_permission(
        &server.store(),
        owner.org_id,
        board_id,
        viewer_id,
        PermissionLevel::Viewer,
    )
    .await;

    let outcome = push_one(
        &server,
        &viewer_token,
        "group-b",
        1,
        "tab-b",
        "createColumn",
        json!({ "id": Uuid::new_v4(), "boardID": board_id, "name": "Todo" }),
    )
    .await;
    assert_denied(&outcome);

    // Raising the grant to editor makes the same mutation succeed.
    grant_permission(
        &server.store(),
        owner.org_id,
        board_id,
        viewer_id,
        PermissionLevel::Editor,
    )
    .await;

    let outcome = push_one(
        &server,
        &viewer_token,
        "group-b",
        2,
        "tab-b",
        "createColumn",
        json!({ "id": Uuid::new_v4(), "boardID": board_id, "name": "Todo" }),
    )
    .await;
    assert_applied(&outcome);
}

#[tokio::test]
async fn test_editor_cannot_delete_board() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (editor_id, editor_token) =
        add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let outcome = push_one(
        &server,
        &owner.token,
        "group-a",
        1,
        "tab-a",
        "createBoard",
        json!({ "id": board_id, "name": "Durable" }),
    )
    .await;
    assert_applied(&outcome);

    grant_permission(
        &server.store(),
        owner.org_id,
        board_id,
        editor_id,
        PermissionLevel::Editor,
    )
    .await;

    let outcome = push_one(
        &server,
        &editor_token,
        "group-b",
        1,
        "tab-b",
        "deleteBoard",
        json!({ "id": board_id }),
    )
    .await;
    assert_denied(&outcome);

    // The board survived.
    let (status, boards) =
        json_request(&server.router, "GET", "/api/boards", None, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(boards.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cross_tenant_reference_is_denied() {
    let server = TestServer::new().await;
    let acme = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let rival = provision_tenant(&server.store(), "rival", OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let outcome = push_one(
        &server,
        &acme.token,
        "group-a",
        1,
        "tab-a",
        "createBoard",
        json!({ "id": board_id, "name": "Secret" }),
    )
    .await;
    assert_applied(&outcome);

    // A foreign board id is indistinguishable from a missing one.
    let outcome = push_one(
        &server,
        &rival.token,
        "group-b",
        1,
        "tab-b",
        "createColumn",
        json!({ "id": Uuid::new_v4(), "boardID": board_id, "name": "Heist" }),
    )
    .await;
    assert_denied(&outcome);

    let outcome = push_one(
        &server,
        &rival.token,
        "group-b",
        2,
        "tab-b",
        "createColumn",
        json!({ "id": Uuid::new_v4(), "boardID": Uuid::new_v4(), "name": "Nowhere" }),
    )
    .await;
    assert_denied(&outcome);
}

#[tokio::test]
async fn test_move_task_checks_destination_column() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (mover_id, mover_token) =
        add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_x = Uuid::new_v4();
    let board_y = Uuid::new_v4();
    let col_x = Uuid::new_v4();
    let col_y = Uuid::new_v4();
    let task_id = Uuid::new_v4();

    let body = json!({
        "clientGroupID": "group-a",
        "mutations": [
            { "id": 1, "clientID": "tab-a", "name": "createBoard",
              "args": { "id": board_x, "name": "Source" } },
            { "id": 2, "clientID": "tab-a", "name": "createColumn",
              "args": { "id": col_x, "boardID": board_x, "name": "Todo" } },
            { "id": 3, "clientID": "tab-a", "name": "createTask",
              "args": { "id": task_id, "columnID": col_x, "name": "Wander" } },
            { "id": 4, "clientID": "tab-a", "name": "createBoard",
              "args": { "id": board_y, "name": "Destination" } },
            { "id": 5, "clientID": "tab-a", "name": "createColumn",
              "args": { "id": col_y, "boardID": board_y, "name": "Done" } },
        ],
    });
    let (status, setup) =
        json_request(&server.router, "POST", "/sync/push", Some(body), Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    for outcome in setup["outcomes"].as_array().unwrap() {
        assert_applied(outcome);
    }

    grant_permission(
        &server.store(),
        owner.org_id,
        board_x,
        mover_id,
        PermissionLevel::Editor,
    )
    .await;

    // Editor on the source board only: the cross-board move is denied.
    let outcome = push_one(
        &server,
        &mover_token,
        "group-b",
        1,
        "tab-b",
        "moveTask",
        json!({ "id": task_id, "columnID": col_y }),
    )
    .await;
    assert_denied(&outcome);

    grant_permission(
        &server.store(),
        owner.org_id,
        board_y,
        mover_id,
        PermissionLevel::Editor,
    )
    .await;

    let outcome = push_one(
        &server,
        &mover_token,
        "group-b",
        2,
        "tab-b",
        "moveTask",
        json!({ "id": task_id, "columnID": col_y }),
    )
    .await;
    assert_applied(&outcome);
}

#[tokio::test]
async fn test_note_deletion_requires_org_admin() {
    let server = TestServer::new().await;
    let member = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (_, admin_token) = add_member(&server.store(), member.org_id, OrgRole::Admin).await;

    let note_id = Uuid::new_v4();
    let outcome = push_one(
        &server,
        &member.token,
        "group-a",
        1,
        "tab-a",
        "createNote",
        json!({ "id": note_id, "title": "Disposable" }),
    )
    .await;
    assert_applied(&outcome);

    let outcome = push_one(
        &server,
        &member.token,
        "group-a",
        2,
        "tab-a",
        "deleteNote",
        json!({ "id": note_id }),
    )
    .await;
    assert_denied(&outcome);

    let outcome = push_one(
        &server,
        &admin_token,
        "group-b",
        1,
        "tab-b",
        "deleteNote",
        json!({ "id": note_id }),
    )
    .await;
    assert_applied(&outcome);

    // The note is gone from the REST list.
    let (status, notes) =
        json_request(&server.router, "GET", "/api/notes", None, Some(&member.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(notes.as_array().unwrap().is_empty());
}
