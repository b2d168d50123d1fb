//! Handler for `POST /uploads`.
//!
//! Accepts one image per request as multipart form data:
//!
//! | Field        | Required | Notes                                          |
//! |--------------|----------|------------------------------------------------|
//! | `file`       | yes      | the image                                      |
//! | `page`       | yes      | theme page id                                  |
//! | `section`    | yes      | section id within the page                     |
//! | `field_id`   | yes      | field id, may carry an item path (`posts[0].photo`) |
//! | `website_id` | no       | omit before the website exists                 |
//! | `theme_id`   | no       | theme used for constraints when there is no website |

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use schoolsite_core::content::{FieldPath, PathSegment};
use schoolsite_core::error::CoreError;
use schoolsite_core::imaging::{normalize, ImageConstraints, MAX_UPLOAD_BYTES};
use schoolsite_core::storage::file_name_from_key;
use schoolsite_core::theme::{FieldKind, FieldSchema, ThemeSchema};
use schoolsite_core::types::DbId;
use schoolsite_pipeline::assets::{RegisterMode, UploadTarget};
use serde::Serialize;

use super::managed_website;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body ceiling for the upload route. Leaves room for the multipart
/// framing so oversized images are rejected by the normalizer with a
/// validation error instead of a bare 413.
pub const UPLOAD_BODY_LIMIT: usize = 2 * MAX_UPLOAD_BYTES;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    /// Stored file name.
    pub name: String,
    /// `true` until the content referencing it is submitted.
    pub temporary: bool,
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, String, Vec<u8>)>,
    website_id: Option<DbId>,
    theme_id: Option<String>,
    page: Option<String>,
    section: Option<String>,
    field_id: Option<String>,
}

/// POST /api/v1/uploads
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadResponse>>)> {
    let form = read_form(multipart).await?;

    let (original_name, mime_type, bytes) = form
        .file
        .ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    let page = required(form.page, "page")?;
    let section = required(form.section, "section")?;
    let field_id = required(form.field_id, "field_id")?;

    let placement = FieldPath::parse(&format!("{page}.{section}.{field_id}"))?.to_string();

    let theme_id = match form.website_id {
        Some(id) => Some(managed_website(&state, &user, id).await?.theme_id),
        None => form.theme_id,
    };
    let field = match &theme_id {
        Some(theme_id) => {
            let schema = state.orchestrator.themes().schema(theme_id).await?;
            resolve_field(&schema, &page, &section, &field_id)
        }
        None => None,
    };
    if let Some(field) = &field {
        if !field.kind.is_image() {
            return Err(CoreError::Validation(format!(
                "Field '{placement}' does not accept images"
            ))
            .into());
        }
    }

    let constraints = field
        .as_ref()
        .map(|f| f.image_constraints())
        .unwrap_or_else(ImageConstraints::default);
    let mode = match field.as_ref().map(|f| f.kind) {
        Some(FieldKind::ImageSet) => RegisterMode::Append,
        _ => RegisterMode::Replace,
    };

    let image = tokio::task::spawn_blocking(move || normalize(&bytes, &mime_type, &constraints))
        .await
        .map_err(|e| AppError::InternalError(format!("Image normalization task failed: {e}")))??;

    let target = state
        .orchestrator
        .assets()
        .store_upload(form.website_id, &placement, &original_name, image, mode)
        .await?;

    let (url, key, temporary) = match target {
        UploadTarget::Temporary(blob) => (blob.url, blob.key, true),
        UploadTarget::Registered(asset) => (asset.url, asset.storage_key, false),
    };
    tracing::info!(
        user_id = user.user_id,
        website_id = ?form.website_id,
        placement = %placement,
        temporary,
        "Image uploaded",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadResponse {
                url,
                name: file_name_from_key(&key).to_string(),
                temporary,
            },
        }),
    ))
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.file = Some((filename, content_type, data.to_vec()));
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let text = text.trim().to_string();
        match name.as_str() {
            "website_id" if !text.is_empty() => {
                let id = text.parse::<DbId>().map_err(|_| {
                    AppError::BadRequest(format!("Invalid website_id '{text}'"))
                })?;
                form.website_id = Some(id);
            }
            "theme_id" if !text.is_empty() => form.theme_id = Some(text),
            "page" => form.page = Some(text),
            "section" => form.section = Some(text),
            "field_id" => form.field_id = Some(text),
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

/// Schema of `field_id`, following item paths such as `posts[0].photo` into
/// list item fields.
fn resolve_field(
    schema: &ThemeSchema,
    page: &str,
    section: &str,
    field_id: &str,
) -> Option<FieldSchema> {
    let path = FieldPath::parse(field_id).ok()?;
    let mut keys = path.segments().iter().filter_map(|segment| match segment {
        PathSegment::Key(key) => Some(key.as_str()),
        PathSegment::Index(_) => None,
    });
    let mut field = schema.field(page, section, keys.next()?)?;
    for key in keys {
        field = field.fields.iter().find(|f| f.id == key)?;
    }
    Some(field.clone())
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing required '{name}' field")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "id": "basic",
        "name": "Basic",
        "pages": [{
            "id": "news",
            "title": "News",
            "sections": [{
                "id": "feed",
                "fields": [
                    { "id": "posts", "type": "list", "fields": [
                        { "id": "headline", "type": "text" },
                        { "id": "photo", "type": "image", "min_width": 300 }
                    ]},
                    { "id": "banner", "type": "image_set" }
                ]
            }]
        }]
    }"#;

    #[test]
    fn resolves_top_level_and_item_fields() {
        let schema = ThemeSchema::from_json(SCHEMA).unwrap();

        let banner = resolve_field(&schema, "news", "feed", "banner").unwrap();
        assert_eq!(banner.kind, FieldKind::ImageSet);

        let photo = resolve_field(&schema, "news", "feed", "posts[2].photo").unwrap();
        assert_eq!(photo.kind, FieldKind::Image);
        assert_eq!(photo.min_width, Some(300));

        assert!(resolve_field(&schema, "news", "feed", "posts[0].missing").is_none());
        assert!(resolve_field(&schema, "home", "feed", "banner").is_none());
    }
}
