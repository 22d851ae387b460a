//! Cloud-storage completion notifications for externally rendered lesson
//! audio
//!
//! The route carries a shared secret as its last path segment. The
//! notification's `message.data` is base64 JSON naming the stored object;
//! objects named `lesson-<id>-audio.mp3` complete that lesson's audio.
//! Anything else is acknowledged with 204 and ignored. Failures return 500
//! so the sender redelivers.

use crate::db::lessons;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lisan_common::auth::constant_time_eq;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::JsonBody;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PushEnvelope {
    pub message: Option<PushMessage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PushMessage {
    pub data: Option<String>,
}

/// Decoded storage object notification
#[derive(Debug, Deserialize)]
pub struct StorageObject {
    pub name: Option<String>,
}

fn lesson_audio_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"lesson-(\d+)-audio\.mp3").ok())
        .as_ref()
}

/// Lesson id encoded in an object name
pub fn lesson_id_from_object(name: &str) -> Option<i64> {
    if !name.ends_with(".mp3") {
        return None;
    }
    lesson_audio_regex()?
        .captures(name)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

pub fn public_object_url(bucket: &str, name: &str) -> String {
    format!("https://storage.googleapis.com/{}/{}", bucket, name)
}

/// POST /api/v1/webhooks/gcs-tts-complete/:secret
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/gcs-tts-complete/{secret}",
    tag = "webhooks",
    params(("secret" = String, Path, description = "Shared webhook secret")),
    request_body = PushEnvelope,
    responses(
        (status = 204, description = "Notification applied or ignored"),
        (status = 404, description = "Unknown secret"),
        (status = 500, description = "Notification could not be applied; redeliver")
    )
)]
pub async fn storage_notification(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    JsonBody(envelope): JsonBody<PushEnvelope>,
) -> ApiResult<StatusCode> {
    let authorized = state
        .webhook
        .secret_key
        .as_deref()
        .filter(|s| !s.is_empty())
        .is_some_and(|expected| constant_time_eq(expected.as_bytes(), secret.as_bytes()));
    if !authorized {
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    let Some(data) = envelope.message.and_then(|m| m.data) else {
        warn!("Storage notification without data");
        return Ok(StatusCode::NO_CONTENT);
    };

    let decoded = STANDARD
        .decode(data.trim())
        .map_err(|e| ApiError::Internal(format!("Undecodable notification data: {}", e)))?;
    let object: StorageObject = serde_json::from_slice(&decoded)
        .map_err(|e| ApiError::Internal(format!("Unparseable notification: {}", e)))?;

    let Some(name) = object.name else {
        return Ok(StatusCode::NO_CONTENT);
    };
    info!(object = %name, "Storage notification received");

    let Some(lesson_id) = lesson_id_from_object(&name) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    let bucket = state
        .webhook
        .bucket_name
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Webhook bucket name is not configured".to_string()))?;
    let url = public_object_url(bucket, &name);

    if !lessons::complete_audio_from_storage(&state.db, lesson_id, &url).await? {
        return Err(ApiError::Internal(format!(
            "Lesson {} for object {} does not exist",
            lesson_id, name
        )));
    }

    info!(lesson_id, url = %url, "Lesson audio completed from storage");
    Ok(StatusCode::NO_CONTENT)
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/gcs-tts-complete/:secret", post(storage_notification))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_id_from_object() {
        assert_eq!(lesson_id_from_object("lesson-123-audio.mp3"), Some(123));
        assert_eq!(lesson_id_from_object("tts/lesson-7-audio.mp3"), Some(7));
        assert_eq!(lesson_id_from_object("lesson-123-audio.txt"), None);
        assert_eq!(lesson_id_from_object("lesson-abc-audio.mp3"), None);
        assert_eq!(lesson_id_from_object("intro.mp3"), None);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_object_url("lisan-audio", "lesson-1-audio.mp3"),
            "https://storage.googleapis.com/lisan-audio/lesson-1-audio.mp3"
        );
    }
}
