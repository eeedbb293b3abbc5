mod common;
mod http_helpers;

use assetdesk::config::AppConfig;
use assetdesk::sequence::SequenceCache;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{read_json, send, test_app};
use http_helpers::{as_user, json_request};
use serde_json::json;
use tower::ServiceExt;

fn staff_body(first: &str, last: &str) -> serde_json::Value {
    json!({
        "first_name": first,
        "last_name": last,
        "date_of_birth": "1995-04-02",
        "joined_date": "2020-01-06",
        "gender": "Male",
        "role": "Staff"
    })
}

#[tokio::test]
async fn system_endpoints_need_no_identity() {
    let (app, _, _) = test_app(AppConfig::default()).await;
    let health = Request::builder()
        .uri("/system/health")
        .body(Body::empty())
        .expect("health");
    let response = app.clone().oneshot(health).await.expect("health");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ok");

    let info = Request::builder()
        .uri("/system/info")
        .body(Body::empty())
        .expect("info");
    let (status, payload) = send(&app, info).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["storage_backend"], "memory");
    assert_eq!(payload["durable_storage"], false);

    let openapi = Request::builder()
        .uri("/openapi.json")
        .body(Body::empty())
        .expect("openapi");
    let (status, payload) = send(&app, openapi).await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["paths"]["/asset-management"].is_object());
}

#[tokio::test]
async fn identity_header_is_required_and_checked() {
    let (app, _, admin) = test_app(AppConfig::default()).await;

    let missing = Request::builder()
        .uri("/category")
        .body(Body::empty())
        .expect("request");
    let (status, payload) = send(&app, missing).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload["code"], "unauthorized");

    let (status, _) = send(&app, as_user("GET", "/category", "not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        as_user("GET", "/category", uuid::Uuid::new_v4(), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        as_user("POST", "/user-management", admin.id, Some(staff_body("John", "Doe"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, list) = send(&app, as_user("GET", "/user-management?role=Staff", admin.id, None)).await;
    let staff_id = list["items"][0]["id"].as_str().expect("staff id").to_string();

    let (status, payload) = send(&app, as_user("GET", "/asset-management", &staff_id, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["code"], "forbidden");
}

#[tokio::test]
async fn asset_codes_follow_category_prefix() {
    let (app, _, admin) = test_app(AppConfig::default()).await;

    let (status, laptop) = send(
        &app,
        as_user(
            "POST",
            "/category",
            admin.id,
            Some(json!({ "name": "Laptop", "prefix": "la" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(laptop["prefix"], "LA");

    let (status, payload) = send(
        &app,
        as_user(
            "POST",
            "/category",
            admin.id,
            Some(json!({ "name": "laptop", "prefix": "LP" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "duplicate_category");

    let mut codes = Vec::new();
    for name in ["Dell XPS", "ThinkPad"] {
        let (status, asset) = send(
            &app,
            as_user(
                "POST",
                "/asset-management",
                admin.id,
                Some(json!({
                    "name": name,
                    "category_id": laptop["id"],
                    "specification": "16GB",
                    "installed_date": "2023-03-01",
                    "state": "Available"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(asset["location"], "HN");
        codes.push(asset["code"].as_str().expect("code").to_string());
    }
    assert_eq!(codes, vec!["LA000001", "LA000002"]);

    let (status, payload) = send(
        &app,
        as_user(
            "POST",
            "/asset-management",
            admin.id,
            Some(json!({
                "name": "Broken",
                "category_id": laptop["id"],
                "installed_date": "2023-03-01",
                "state": "Assigned"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "validation_error");

    let (status, list) = send(
        &app,
        as_user(
            "GET",
            "/asset-management?sort=name&order=desc&page_size=1",
            admin.id,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);
    assert_eq!(list["items"][0]["name"], "ThinkPad");

    let (status, payload) = send(
        &app,
        as_user("GET", "/asset-management?sort=price", admin.id, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "validation_error");
}

#[tokio::test]
async fn users_get_generated_identifiers_and_can_log_in() {
    let (app, _, admin) = test_app(AppConfig::default()).await;
    assert_eq!(admin.staff_code, "SD0001");

    let mut created = Vec::new();
    for _ in 0..2 {
        let (status, user) = send(
            &app,
            as_user("POST", "/user-management", admin.id, Some(staff_body("John", "Doe"))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(user.get("password_hash").is_none());
        created.push(user);
    }
    assert_eq!(created[0]["staff_code"], "SD0002");
    assert_eq!(created[0]["username"], "johnd");
    assert_eq!(created[1]["staff_code"], "SD0003");
    assert_eq!(created[1]["username"], "johnd1");

    let (status, payload) = send(
        &app,
        as_user(
            "POST",
            "/user-management",
            admin.id,
            Some(json!({
                "first_name": "Young",
                "last_name": "Person",
                "date_of_birth": "2020-01-01",
                "joined_date": "2024-01-08",
                "gender": "Female",
                "role": "Staff"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "validation_error");

    let login = json_request(
        "POST",
        "/auth/login",
        json!({ "username": "johnd1", "password": "johnd1@02041995" }),
    );
    let (status, payload) = send(&app, login).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["is_first_login"], true);
    assert_eq!(payload["user"]["staff_code"], "SD0003");

    let user_id = created[1]["id"].as_str().expect("id");
    let change = as_user(
        "POST",
        "/auth/change-password",
        user_id,
        Some(json!({ "old_password": "johnd1@02041995", "new_password": "s3cret!" })),
    );
    let (status, _) = send(&app, change).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let login = json_request(
        "POST",
        "/auth/login",
        json!({ "username": "johnd1", "password": "s3cret!" }),
    );
    let (status, payload) = send(&app, login).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["is_first_login"], false);
}

#[tokio::test]
async fn repeated_login_failures_are_rate_limited() {
    let config = AppConfig {
        max_login_attempts: 3,
        ..AppConfig::default()
    };
    let (app, _, _) = test_app(config).await;
    let attempt = || {
        json_request(
            "POST",
            "/auth/login",
            json!({ "username": "admind", "password": "wrong" }),
        )
    };
    for _ in 0..3 {
        let (status, payload) = send(&app, attempt()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload["code"], "unauthorized");
    }
    let (status, payload) = send(&app, attempt()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(payload["code"], "too_many_requests");

    let correct = json_request(
        "POST",
        "/auth/login",
        json!({ "username": "admind", "password": "admind@01011990" }),
    );
    let (status, _) = send(&app, correct).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn disabled_users_cannot_log_in() {
    let (app, _, admin) = test_app(AppConfig::default()).await;
    let (_, user) = send(
        &app,
        as_user("POST", "/user-management", admin.id, Some(staff_body("Mary", "Ann Lee"))),
    )
    .await;
    assert_eq!(user["username"], "maryal");
    let uri = format!("/user-management/{}/disable", user["id"].as_str().expect("id"));
    let (status, disabled) = send(&app, as_user("POST", &uri, admin.id, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disabled["is_disabled"], true);

    let login = json_request(
        "POST",
        "/auth/login",
        json!({ "username": "maryal", "password": "maryal@02041995" }),
    );
    let (status, _) = send(&app, login).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        as_user("GET", "/category", user["id"].as_str().expect("id"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resync_replays_stored_usernames() {
    let (app, state, admin) = test_app(AppConfig::default()).await;
    let (_, _) = send(
        &app,
        as_user("POST", "/user-management", admin.id, Some(staff_body("John", "Doe"))),
    )
    .await;
    state
        .cache
        .delete("usernames:present")
        .await
        .expect("flush bitmap");

    let (status, payload) = send(&app, as_user("GET", "/sample/sync-redis", admin.id, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["usernames"], 2);

    let (_, user) = send(
        &app,
        as_user("POST", "/user-management", admin.id, Some(staff_body("John", "Doe"))),
    )
    .await;
    assert_eq!(user["username"], "johnd1");
}
