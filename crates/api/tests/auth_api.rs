//! Authentication, role checks and the theme endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, get_authed, json_authed, send};
use schoolsite_api::auth::jwt::{generate_access_token, JwtConfig};
use serde_json::json;

#[tokio::test]
async fn missing_authorization_header_is_rejected() {
    let test = common::build_test_app();
    let response = get(test.app, "/api/v1/themes").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Missing Authorization header");
}

#[tokio::test]
async fn non_bearer_authorization_is_rejected() {
    let test = common::build_test_app();
    let request = Request::get("/api/v1/websites")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();

    let response = send(test.app, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let test = common::build_test_app();
    let foreign = JwtConfig {
        secret: "some-other-secret".into(),
        access_token_expiry_mins: 15,
    };
    let token = generate_access_token(1, "user", &foreign).unwrap();

    let response = get_authed(test.app, "/api/v1/themes", &token).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}

#[tokio::test]
async fn admin_routes_require_super_admin() {
    let test = common::build_test_app();
    let token = test.user_token(5);

    let response = get_authed(test.app.clone(), "/api/v1/admin/websites", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = json_authed(
        test.app.clone(),
        Method::PUT,
        "/api/v1/admin/websites/1/status",
        &token,
        json!({ "status": "inactive" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_authed(test.app, "/api/v1/admin/integrity", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lists_themes_in_data_envelope() {
    let test = common::build_test_app();
    let token = test.user_token(1);

    let response = get_authed(test.app, "/api/v1/themes", &token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let themes = json["data"].as_array().unwrap();
    assert_eq!(themes.len(), 1);
    assert_eq!(themes[0]["id"], "basic");
    assert_eq!(themes[0]["name"], "Basic School");
}

#[tokio::test]
async fn returns_theme_schema() {
    let test = common::build_test_app();
    let token = test.user_token(1);

    let response = get_authed(test.app, "/api/v1/themes/basic", &token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let pages: Vec<&str> = json["data"]["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(pages, vec!["home", "news", "gallery"]);
    assert_eq!(
        json["data"]["pages"][0]["sections"][0]["fields"][0]["type"],
        "text"
    );
}

#[tokio::test]
async fn unknown_and_malformed_theme_ids() {
    let test = common::build_test_app();
    let token = test.user_token(1);

    let response = get_authed(test.app.clone(), "/api/v1/themes/retro", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "THEME_NOT_FOUND");

    let response = get_authed(test.app, "/api/v1/themes/Retro%20Theme", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}
