//! Arabic text recognition from uploaded images

use super::AuthUser;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

/// Largest accepted image
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit for the route: the image plus multipart framing
const BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

#[derive(Debug, Serialize, ToSchema)]
pub struct OcrText {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OcrResponse {
    #[schema(value_type = String, example = "success")]
    pub status: &'static str,
    pub data: OcrText,
}

/// Multipart form accepted by the scan route
#[derive(ToSchema)]
pub struct ScanForm {
    /// Image file, at most 5 MB
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// POST /api/v1/ocr/scan (multipart field `image`)
#[utoipa::path(
    post,
    path = "/api/v1/ocr/scan",
    tag = "ocr",
    request_body(content = ScanForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Recognized Arabic text", body = OcrResponse),
        (status = 400, description = "Missing, empty or oversized image")
    ),
    security(("bearer_auth" = []))
)]
pub async fn scan_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<OcrResponse>> {
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("image/png").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {}", e)))?;
        image = Some((bytes.to_vec(), content_type));
        break;
    }

    let (bytes, content_type) = image
        .filter(|(bytes, _)| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image file uploaded".to_string()))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::BadRequest("Image must be at most 5 MB".to_string()));
    }

    let text = state
        .services
        .ocr
        .recognize_arabic(&bytes, &content_type)
        .await?;

    info!(user_id = user.user_id, bytes = bytes.len(), chars = text.chars().count(), "OCR scan completed");

    Ok(Json(OcrResponse {
        status: "success",
        data: OcrText { text },
    }))
}

pub fn ocr_routes() -> Router<AppState> {
    Router::new()
        .route("/ocr/scan", post(scan_image))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}
