//! Lessons and their Arabic narration
//!
//! Narration is synthesized inline for short content. Content longer than
//! the configured threshold is handed to the audio job queue: the lesson is
//! stored as `PROCESSING` with the job id and updated when the job ends.

use super::validation::Validator;
use super::{created, ok, AdminUser, AuthUser, Envelope, Id, JsonBody};
use crate::db::lessons::{self, LessonAudio, LessonChanges, LessonWithLevel, NewLesson};
use crate::db::{levels, progress};
use crate::services::{delete_audio_best_effort, synthesize_and_upload, AudioJob, VoiceLanguage};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lisan_common::db::{Lesson, UserLessonProgress};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const SEQUENCE_TAKEN: &str = "Sequence number is already used in this level";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub level_id: i64,
    pub voice_path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub sequence: Option<i64>,
    pub level_id: Option<i64>,
    pub voice_path: Option<String>,
}

/// Narration decided for new or changed content
struct Narration {
    audio: LessonAudio,
    /// Job to submit once the row carries its id
    job_text: Option<(Uuid, String)>,
}

impl Narration {
    fn supplied(path: String) -> Self {
        Self {
            audio: LessonAudio::ready(Some(path)),
            job_text: None,
        }
    }

    /// Upload URL created by this request, to remove if the write fails
    fn fresh_upload(&self, supplied: bool) -> Option<&str> {
        if supplied {
            None
        } else {
            self.audio.voice_path.as_deref()
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Lesson not found".to_string())
}

fn map_write_error(e: lisan_common::Error) -> ApiError {
    if e.is_unique_violation() {
        ApiError::Conflict(SEQUENCE_TAKEN.to_string())
    } else if e.is_foreign_key_violation() {
        ApiError::BadRequest("Level does not exist".to_string())
    } else {
        e.into()
    }
}

/// Synthesize short content now, or reserve a job id for long content
async fn narrate(state: &AppState, content: &str) -> ApiResult<Narration> {
    if content.len() > state.long_text_threshold {
        let job_id = Uuid::new_v4();
        return Ok(Narration {
            audio: LessonAudio::pending(job_id.to_string()),
            job_text: Some((job_id, content.to_string())),
        });
    }

    let url = synthesize_and_upload(
        state.services.speech.as_ref(),
        state.services.media.as_ref(),
        content,
        VoiceLanguage::Arabic,
    )
    .await?;

    Ok(Narration::supplied(url))
}

/// Submit the reserved job; a closed queue marks the lesson `FAILED`
async fn submit_job(state: &AppState, lesson: Lesson, job_text: Option<(Uuid, String)>) -> ApiResult<Lesson> {
    let Some((id, text)) = job_text else {
        return Ok(lesson);
    };

    let job = AudioJob {
        id,
        lesson_id: lesson.id,
        text,
    };

    match state.audio_jobs.enqueue(job).await {
        Ok(job_id) => {
            info!(lesson_id = lesson.id, job_id = %job_id, "Queued lesson audio");
            Ok(lesson)
        }
        Err(e) => {
            warn!(lesson_id = lesson.id, error = %e, "Could not queue lesson audio");
            lessons::finish_audio_job(&state.db, lesson.id, &id.to_string(), None).await?;
            Ok(lessons::get(&state.db, lesson.id).await?.unwrap_or(lesson))
        }
    }
}

/// GET /api/v1/lessons
#[utoipa::path(
    get,
    path = "/api/v1/lessons",
    tag = "lessons",
    responses((status = 200, description = "All lessons with their level", body = [LessonWithLevel]))
)]
pub async fn list_lessons(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<LessonWithLevel>>>> {
    let lessons = lessons::list(&state.db).await?;
    Ok(ok("Lessons retrieved", lessons))
}

/// GET /api/v1/lessons/:id
#[utoipa::path(
    get,
    path = "/api/v1/lessons/{id}",
    tag = "lessons",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson with its level", body = LessonWithLevel),
        (status = 404, description = "Lesson not found")
    )
)]
pub async fn get_lesson(
    State(state): State<AppState>,
    Id(id): Id,
) -> ApiResult<Json<Envelope<LessonWithLevel>>> {
    let lesson = lessons::get_with_level(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(ok("Lesson retrieved", lesson))
}

/// GET /api/v1/lessons/level/:levelId
#[utoipa::path(
    get,
    path = "/api/v1/lessons/level/{levelId}",
    tag = "lessons",
    params(("levelId" = i64, Path, description = "Level id")),
    responses(
        (status = 200, description = "Lessons of the level in sequence order", body = [Lesson]),
        (status = 404, description = "Level not found")
    )
)]
pub async fn list_lessons_by_level(
    State(state): State<AppState>,
    Id(level_id): Id,
) -> ApiResult<Json<Envelope<Vec<Lesson>>>> {
    if !levels::exists(&state.db, level_id).await? {
        return Err(ApiError::NotFound("Level not found".to_string()));
    }

    let lessons = lessons::list_by_level(&state.db, level_id).await?;
    Ok(ok("Lessons retrieved", lessons))
}

/// POST /api/v1/lessons
#[utoipa::path(
    post,
    path = "/api/v1/lessons",
    tag = "lessons",
    request_body = CreateLessonRequest,
    responses(
        (status = 201, description = "Lesson created, audio ready or PROCESSING", body = Lesson),
        (status = 400, description = "Invalid fields or unknown level"),
        (status = 409, description = "Sequence already used in the level")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(req): JsonBody<CreateLessonRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Lesson>>)> {
    let mut v = Validator::new();
    v.min_chars("title", &req.title, 1, "Lesson title is required")
        .min_chars("content", &req.content, 1, "Lesson content is required")
        .check(req.sequence >= 1, "sequence", "Sequence must be a positive integer")
        .check(req.level_id >= 1, "levelId", "Level id is required");
    v.finish()?;

    if !levels::exists(&state.db, req.level_id).await? {
        return Err(ApiError::BadRequest("Level does not exist".to_string()));
    }

    let supplied = req.voice_path.as_deref().is_some_and(|p| !p.is_empty());
    let narration = match req.voice_path.filter(|p| !p.is_empty()) {
        Some(path) => Narration::supplied(path),
        None => narrate(&state, &req.content).await?,
    };

    let new = NewLesson {
        title: req.title.trim().to_string(),
        content: req.content,
        sequence: req.sequence,
        level_id: req.level_id,
        audio: narration.audio.clone(),
    };

    let lesson = match lessons::create(&state.db, &new).await {
        Ok(lesson) => lesson,
        Err(e) => {
            delete_audio_best_effort(state.services.media.as_ref(), narration.fresh_upload(supplied)).await;
            return Err(map_write_error(e));
        }
    };

    info!(lesson_id = lesson.id, level_id = lesson.level_id, "Created lesson");
    let lesson = submit_job(&state, lesson, narration.job_text).await?;
    Ok(created("Lesson created", lesson))
}

/// PUT /api/v1/lessons/:id
///
/// Changed content is narrated again unless a `voicePath` is supplied; the
/// previous audio file is then deleted.
#[utoipa::path(
    put,
    path = "/api/v1/lessons/{id}",
    tag = "lessons",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = UpdateLessonRequest,
    responses(
        (status = 200, description = "Lesson updated", body = Lesson),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Sequence already used in the level")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    JsonBody(req): JsonBody<UpdateLessonRequest>,
) -> ApiResult<Json<Envelope<Lesson>>> {
    let mut v = Validator::new();
    if let Some(title) = &req.title {
        v.min_chars("title", title, 1, "Lesson title cannot be empty");
    }
    if let Some(content) = &req.content {
        v.min_chars("content", content, 1, "Lesson content cannot be empty");
    }
    if let Some(sequence) = req.sequence {
        v.check(sequence >= 1, "sequence", "Sequence must be a positive integer");
    }
    if let Some(level_id) = req.level_id {
        v.check(level_id >= 1, "levelId", "Level id must be a positive integer");
    }
    v.finish()?;

    let existing = lessons::get(&state.db, id).await?.ok_or_else(not_found)?;

    if let Some(level_id) = req.level_id {
        if !levels::exists(&state.db, level_id).await? {
            return Err(ApiError::NotFound("Level not found".to_string()));
        }
    }

    let supplied = req.voice_path.as_deref().is_some_and(|p| !p.is_empty());
    let changed_content = req.content.as_deref().filter(|c| *c != existing.content);

    let narration = match (req.voice_path.clone().filter(|p| !p.is_empty()), changed_content) {
        (Some(path), _) => Some(Narration::supplied(path)),
        (None, Some(content)) => Some(narrate(&state, content).await?),
        (None, None) => None,
    };

    let changes = LessonChanges {
        title: req.title.map(|t| t.trim().to_string()),
        content: req.content,
        sequence: req.sequence,
        level_id: req.level_id,
        audio: narration.as_ref().map(|n| n.audio.clone()),
    };

    let media = state.services.media.as_ref();
    let updated = match lessons::update(&state.db, id, &changes).await {
        Ok(Some(lesson)) => lesson,
        Ok(None) => return Err(not_found()),
        Err(e) => {
            if let Some(narration) = &narration {
                delete_audio_best_effort(media, narration.fresh_upload(supplied)).await;
            }
            return Err(map_write_error(e));
        }
    };

    info!(lesson_id = id, "Updated lesson");

    let Some(narration) = narration else {
        return Ok(ok("Lesson updated", updated));
    };

    if existing.voice_path != updated.voice_path {
        delete_audio_best_effort(media, existing.voice_path.as_deref()).await;
    }

    let updated = submit_job(&state, updated, narration.job_text).await?;
    Ok(ok("Lesson updated", updated))
}

/// DELETE /api/v1/lessons/:id
#[utoipa::path(
    delete,
    path = "/api/v1/lessons/{id}",
    tag = "lessons",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 404, description = "Lesson not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    let deleted = lessons::delete_with_renumber(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    delete_audio_best_effort(state.services.media.as_ref(), deleted.voice_path.as_deref()).await;
    Ok(ok("Lesson deleted", ()))
}

/// POST /api/v1/lessons/:id/complete
#[utoipa::path(
    post,
    path = "/api/v1/lessons/{id}/complete",
    tag = "lessons",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson progress", body = UserLessonProgress),
        (status = 404, description = "Lesson not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_lesson(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<UserLessonProgress>>> {
    if lessons::get(&state.db, id).await?.is_none() {
        return Err(not_found());
    }

    let progress = progress::upsert_lesson_completion(&state.db, user.user_id, id).await?;
    info!(user_id = user.user_id, lesson_id = id, "Lesson completed");
    Ok(ok("Lesson marked as completed", progress))
}

pub fn lesson_routes() -> Router<AppState> {
    Router::new()
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route("/lessons/level/:level_id", get(list_lessons_by_level))
        .route(
            "/lessons/:id",
            get(get_lesson).put(update_lesson).delete(delete_lesson),
        )
        .route("/lessons/:id/complete", post(complete_lesson))
}
