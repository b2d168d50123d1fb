//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use schoolsite_api::error::AppError;
use schoolsite_core::error::CoreError;
use schoolsite_core::validation::FieldViolation;
use schoolsite_pipeline::PipelineError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "website",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "website with id 42 not found");
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn unknown_theme_returns_404() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::ThemeNotFound("retro".into()))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "THEME_NOT_FOUND");
    assert_eq!(json["error"], "Theme 'retro' not found");
}

#[tokio::test]
async fn field_violations_are_listed_in_details() {
    let violations = vec![
        FieldViolation {
            field: "home.hero.title".into(),
            rule_type: "required".into(),
            message: "Title is required".into(),
            value: None,
        },
        FieldViolation {
            field: "gallery.photos.images".into(),
            rule_type: "max_items".into(),
            message: "At most 3 items".into(),
            value: Some(serde_json::json!(4)),
        },
    ];
    let err = AppError::Pipeline(PipelineError::Core(CoreError::InvalidFields(violations)));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "2 field(s) failed validation");
    let details = json["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["field"], "home.hero.title");
    assert_eq!(details[0]["rule_type"], "required");
    assert_eq!(details[1]["value"], 4);
}

#[tokio::test]
async fn build_failure_returns_502_with_output() {
    let err = AppError::Pipeline(PipelineError::Core(CoreError::Build {
        message: "Website 7 version 3: Generator exited with status 3".into(),
        output: "render error: template failed".into(),
    }));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "BUILD_FAILED");
    assert_eq!(
        json["error"],
        "Website 7 version 3: Generator exited with status 3"
    );
    assert_eq!(json["details"]["output"], "render error: template failed");
}

#[tokio::test]
async fn storage_error_is_sanitized() {
    let err = AppError::Core(CoreError::Storage("disk /srv/uploads is full".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "STORAGE_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("/srv/uploads"));
}

#[tokio::test]
async fn pipeline_io_error_is_internal() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "secret path");
    let (status, json) = error_to_response(AppError::Pipeline(PipelineError::Io(io))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn row_not_found_returns_404() {
    let (status, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn auth_errors_map_to_401_and_403() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("no token".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Forbidden("not yours".into()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
    assert_eq!(json["error"], "not yours");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let (status, json) =
        error_to_response(AppError::BadRequest("Missing required 'file' field".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "Missing required 'file' field");
}
