//! Integration tests for the pull endpoint: version cursors, permission
//! filtering, and tenant isolation.

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

/// Push a batch for a client group.
async fn push(server: &TestServer, token: &str, mutations: Vec<Value>) -> Value {
    let body = json!({ "clientGroupID": "group-1", "mutations": mutations });
    let (status, body) =
        json_request(&server.router, "POST", "/sync/push", Some(body), Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    for outcome in body["outcomes"].as_array().unwrap() {
        assert_eq!(outcome["outcome"].as_str(), Some("applied"), "{outcome}");
    }
    body
}

/// Pull changes after `since`.
async fn pull(server: &TestServer, token: &str, since: i64) -> Value {
    let (status, body) = json_request(
        &server.router,
        "GET",
        &format!("/sync/pull?since={since}"),
        None,
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn mutation(id: i64, name: &str, args: Value) -> Value {
    json!({ "id": id, "clientID": "tab-a", "name": name, "args": args })
}

#[tokio::test]
async fn test_pull_requires_auth() {
    let server = TestServer::new().await;

    let (status, body) =
        json_request(&server.router, "GET", "/sync/pull?since=0", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"].as_str(), Some("unauthorized"));
}

#[tokio::test]
async fn test_initial_pull_is_empty() {
    let server = TestServer::new().await;
    let tenant = provision_tenant(&server.store(), "acme", OrgRole::Member).await;

    let body = pull(&server, &tenant.token, 0).await;

    assert_eq!(body["serverVersion"].as_i64(), Some(0));
    assert!(body["boards"].as_array().unwrap().is_empty());
    assert!(body["columns"].as_array().unwrap().is_empty());
    assert!(body["tasks"].as_array().unwrap().is_empty());
    assert!(body["notes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_pull_returns_all_row_kinds() {
    let server = TestServer::new().await;
    let tenant = provision_tenant(&server.store(), "acme", OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let column_id = Uuid::new_v4();
    push(
        &server,
        &tenant.token,
        vec![
            mutation(
                1,
                "createBoard",
                json!({ "id": board_id, "name": "Roadmap", "color": "#00ff00" }),
            ),
            mutation(
                2,
                "createColumn",
                json!({ "id": column_id, "boardID": board_id, "name": "Todo" }),
            ),
            mutation(
                3,
                "createTask",
                json!({ "id": Uuid::new_v4(), "columnID": column_id, "name": "Ship", "body": "soon" }),
            ),
            mutation(
                4,
                "createNote",
                json!({ "id": Uuid::new_v4(), "title": "Minutes", "body": "nothing decided" }),
            ),
        ],
    )
    .await;

    let body = pull(&server, &tenant.token, 0).await;

    assert_eq!(body["serverVersion"].as_i64(), Some(4));

    let boards = body["boards"].as_array().unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0]["name"].as_str(), Some("Roadmap"));
    assert_eq!(boards[0]["color"].as_str(), Some("#00ff00"));
    assert_eq!(boards[0]["deleted"].as_bool(), Some(false));
    assert_eq!(boards[0]["rowVersion"].as_i64(), Some(1));

    let columns = body["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0]["boardID"].as_str(), Some(board_id.to_string().as_str()));

    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["columnID"].as_str(), Some(column_id.to_string().as_str()));
    assert_eq!(tasks[0]["body"].as_str(), Some("soon"));

    let notes = body["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"].as_str(), Some("Minutes"));
}

#[tokio::test]
async fn test_pull_since_cursor_filters_rows() {
    let server = TestServer::new().await;
    let tenant = provision_tenant(&server.store(), "acme", OrgRole::Member).await;

    push(
        &server,
        &tenant.token,
        vec![mutation(
            1,
            "createBoard",
            json!({ "id": Uuid::new_v4(), "name": "Roadmap" }),
        )],
    )
    .await;
    push(
        &server,
        &tenant.token,
        vec![mutation(
            2,
            "createNote",
            json!({ "id": Uuid::new_v4(), "title": "Minutes" }),
        )],
    )
    .await;

    // The board was stamped at version 1, the note at version 2.
    let body = pull(&server, &tenant.token, 1).await;
    assert_eq!(body["serverVersion"].as_i64(), Some(2));
    assert!(body["boards"].as_array().unwrap().is_empty());
    assert_eq!(body["notes"].as_array().unwrap().len(), 1);

    // A cursor at the current version sees nothing new.
    let body = pull(&server, &tenant.token, 2).await;
    assert!(body["boards"].as_array().unwrap().is_empty());
    assert!(body["notes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_pull_shows_soft_deleted_boards() {
    let server = TestServer::new().await;
    let tenant = provision_tenant(&server.store(), "acme", OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    push(
        &server,
        &tenant.token,
        vec![mutation(
            1,
            "createBoard",
            json!({ "id": board_id, "name": "Doomed" }),
        )],
    )
    .await;
    push(
        &server,
        &tenant.token,
        vec![mutation(2, "deleteBoard", json!({ "id": board_id }))],
    )
    .await;

    // A client that synced before the deletion sees the tombstone.
    let body = pull(&server, &tenant.token, 1).await;
    let boards = body["boards"].as_array().unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0]["deleted"].as_bool(), Some(true));
    assert_eq!(boards[0]["rowVersion"].as_i64(), Some(2));

    // The REST list shows live boards only.
    let (status, boards) =
        json_request(&server.router, "GET", "/api/boards", None, Some(&tenant.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(boards.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_pull_filters_boards_by_permission() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (_, other_token) = add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    let column_id = Uuid::new_v4();
    push(
        &server,
        &owner.token,
        vec![
            mutation(1, "createBoard", json!({ "id": board_id, "name": "Private" })),
            mutation(
                2,
                "createColumn",
                json!({ "id": column_id, "boardID": board_id, "name": "Todo" }),
            ),
            mutation(
                3,
                "createNote",
                json!({ "id": Uuid::new_v4(), "title": "Org-wide" }),
            ),
        ],
    )
    .await;

    // The second member holds no permission on the board: they see the
    // org-wide note but none of the board rows.
    let body = pull(&server, &other_token, 0).await;
    assert_eq!(body["serverVersion"].as_i64(), Some(3));
    assert!(body["boards"].as_array().unwrap().is_empty());
    assert!(body["columns"].as_array().unwrap().is_empty());
    assert!(body["tasks"].as_array().unwrap().is_empty());
    assert_eq!(body["notes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_granting_permission_exposes_board_history() {
    let server = TestServer::new().await;
    let owner = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let (viewer_id, viewer_token) =
        add_member(&server.store(), owner.org_id, OrgRole::Member).await;

    let board_id = Uuid::new_v4();
    push(
        &server,
        &owner.token,
        vec![
            mutation(1, "createBoard", json!({ "id": board_id, "name": "Shared" })),
            mutation(
                2,
                "createColumn",
                json!({ "id": Uuid::new_v4(), "boardID": board_id, "name": "Todo" }),
            ),
        ],
    )
    .await;

    let body = pull(&server, &viewer_token, 0).await;
    assert!(body["boards"].as_array().unwrap().is_empty());

    grant_permission(
        &server.store(),
        owner.org_id,
        board_id,
        viewer_id,
        PermissionLevel::Viewer,
    )
    .await;

    // Rows written before the grant become visible from a zero cursor.
    let body = pull(&server, &viewer_token, 0).await;
    assert_eq!(body["boards"].as_array().unwrap().len(), 1);
    assert_eq!(body["columns"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pull_is_tenant_isolated() {
    let server = TestServer::new().await;
    let acme = provision_tenant(&server.store(), "acme", OrgRole::Member).await;
    let rival = provision_tenant(&server.store(), "rival", OrgRole::Member).await;

    push(
        &server,
        &acme.token,
        vec![
            mutation(
                1,
                "createBoard",
                json!({ "id": Uuid::new_v4(), "name": "Secret plans" }),
            ),
            mutation(
                2,
                "createNote",
                json!({ "id": Uuid::new_v4(), "title": "Secret notes" }),
            ),
        ],
    )
    .await;

    // The other tenant's version counter and row sets are untouched.
    let body = pull(&server, &rival.token, 0).await;
    assert_eq!(body["serverVersion"].as_i64(), Some(0));
    assert!(body["boards"].as_array().unwrap().is_empty());
    assert!(body["notes"].as_array().unwrap().is_empty());
}
