//! Vocabulary entries with generated Arabic and Indonesian audio
//!
//! Both voices are synthesized concurrently and must succeed before the
//! row is written; if either side or the write fails, audio uploaded by
//! the request is removed again. Replaced or deleted audio is removed from media storage
//! on a best-effort basis.

use super::validation::Validator;
use super::{created, ok, AdminUser, Envelope, Id, JsonBody};
use crate::db::vocabularies::{self, NewVocabulary, VocabularyChanges, VocabularyWithCategory};
use crate::db::categories;
use crate::services::{delete_audio_best_effort, synthesize_and_upload, ServiceResult, VoiceLanguage};
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use lisan_common::db::Vocabulary;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVocabularyRequest {
    #[serde(default)]
    pub arabic_text: String,
    #[serde(default)]
    pub indonesian_text: String,
    #[serde(default)]
    pub category_id: i64,
    pub arabic_voice_path: Option<String>,
    pub indonesian_voice_path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVocabularyRequest {
    pub arabic_text: Option<String>,
    pub indonesian_text: Option<String>,
    pub category_id: Option<i64>,
    pub arabic_voice_path: Option<String>,
    pub indonesian_voice_path: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Vocabulary not found".to_string())
}

/// New audio for `text` when it is present, otherwise nothing
async fn synthesize_fresh(
    state: &AppState,
    text: Option<&str>,
    language: VoiceLanguage,
) -> ServiceResult<Option<String>> {
    let Some(text) = text else {
        return Ok(None);
    };

    synthesize_and_upload(
        state.services.speech.as_ref(),
        state.services.media.as_ref(),
        text,
        language,
    )
    .await
    .map(Some)
}

/// Synthesize both sides concurrently
///
/// If either side fails, the other side's upload is deleted before the
/// error is returned.
async fn synthesize_pair(
    state: &AppState,
    arabic: Option<&str>,
    indonesian: Option<&str>,
) -> ApiResult<(Option<String>, Option<String>)> {
    let (arabic, indonesian) = tokio::join!(
        synthesize_fresh(state, arabic, VoiceLanguage::Arabic),
        synthesize_fresh(state, indonesian, VoiceLanguage::Indonesian),
    );

    match (arabic, indonesian) {
        (Ok(arabic), Ok(indonesian)) => Ok((arabic, indonesian)),
        (Ok(uploaded), Err(e)) | (Err(e), Ok(uploaded)) => {
            discard_uploads(state, &[uploaded]).await;
            Err(e.into())
        }
        (Err(e), Err(_)) => Err(e.into()),
    }
}

/// Delete audio uploaded by a request that then failed
async fn discard_uploads(state: &AppState, uploads: &[Option<String>]) {
    let media = state.services.media.as_ref();
    for url in uploads {
        delete_audio_best_effort(media, url.as_deref()).await;
    }
}

async fn ensure_category(state: &AppState, category_id: i64) -> ApiResult<()> {
    if categories::get(&state.db, category_id).await?.is_none() {
        return Err(ApiError::BadRequest("Category does not exist".to_string()));
    }
    Ok(())
}

/// GET /api/v1/vocabularies
#[utoipa::path(
    get,
    path = "/api/v1/vocabularies",
    tag = "vocabularies",
    responses((status = 200, description = "All entries with their category", body = [VocabularyWithCategory]))
)]
pub async fn list_vocabularies(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<VocabularyWithCategory>>>> {
    let entries = vocabularies::list(&state.db).await?;
    Ok(ok("Vocabularies retrieved", entries))
}

/// GET /api/v1/vocabularies/:id
#[utoipa::path(
    get,
    path = "/api/v1/vocabularies/{id}",
    tag = "vocabularies",
    params(("id" = i64, Path, description = "Vocabulary id")),
    responses(
        (status = 200, description = "Entry with its category", body = VocabularyWithCategory),
        (status = 404, description = "Vocabulary not found")
    )
)]
pub async fn get_vocabulary(
    State(state): State<AppState>,
    Id(id): Id,
) -> ApiResult<Json<Envelope<VocabularyWithCategory>>> {
    let entry = vocabularies::get_with_category(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ok("Vocabulary retrieved", entry))
}

/// POST /api/v1/vocabularies
#[utoipa::path(
    post,
    path = "/api/v1/vocabularies",
    tag = "vocabularies",
    request_body = CreateVocabularyRequest,
    responses(
        (status = 201, description = "Entry created with both voices", body = Vocabulary),
        (status = 400, description = "Invalid fields or unknown category"),
        (status = 500, description = "Speech synthesis or upload failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_vocabulary(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(req): JsonBody<CreateVocabularyRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Vocabulary>>)> {
    let mut v = Validator::new();
    v.min_chars("arabicText", &req.arabic_text, 1, "Arabic text is required")
        .min_chars("indonesianText", &req.indonesian_text, 1, "Indonesian text is required")
        .check(req.category_id >= 1, "categoryId", "Category id must be a positive integer");
    v.finish()?;

    ensure_category(&state, req.category_id).await?;

    let arabic_text = req.arabic_text.trim();
    let indonesian_text = req.indonesian_text.trim();
    let arabic_supplied = req.arabic_voice_path.filter(|p| !p.is_empty());
    let indonesian_supplied = req.indonesian_voice_path.filter(|p| !p.is_empty());

    let (arabic_upload, indonesian_upload) = synthesize_pair(
        &state,
        arabic_supplied.is_none().then_some(arabic_text),
        indonesian_supplied.is_none().then_some(indonesian_text),
    )
    .await?;
    let uploads = [arabic_upload.clone(), indonesian_upload.clone()];

    let new = NewVocabulary {
        arabic_text: arabic_text.to_string(),
        indonesian_text: indonesian_text.to_string(),
        category_id: req.category_id,
        arabic_voice_path: arabic_supplied.or(arabic_upload),
        indonesian_voice_path: indonesian_supplied.or(indonesian_upload),
    };

    let vocabulary = match vocabularies::create(&state.db, &new).await {
        Ok(vocabulary) => vocabulary,
        Err(e) => {
            discard_uploads(&state, &uploads).await;
            return Err(e.into());
        }
    };

    info!(vocabulary_id = vocabulary.id, category_id = vocabulary.category_id, "Created vocabulary");
    Ok(created("Vocabulary created", vocabulary))
}

/// PUT /api/v1/vocabularies/:id
///
/// A side whose text changed gets new audio unless a path is supplied for
/// it; the previous file is then deleted.
#[utoipa::path(
    put,
    path = "/api/v1/vocabularies/{id}",
    tag = "vocabularies",
    params(("id" = i64, Path, description = "Vocabulary id")),
    request_body = UpdateVocabularyRequest,
    responses(
        (status = 200, description = "Entry updated", body = Vocabulary),
        (status = 404, description = "Vocabulary not found"),
        (status = 500, description = "Speech synthesis or upload failed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_vocabulary(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    JsonBody(req): JsonBody<UpdateVocabularyRequest>,
) -> ApiResult<Json<Envelope<Vocabulary>>> {
    let mut v = Validator::new();
    if let Some(text) = &req.arabic_text {
        v.min_chars("arabicText", text, 1, "Arabic text cannot be empty");
    }
    if let Some(text) = &req.indonesian_text {
        v.min_chars("indonesianText", text, 1, "Indonesian text cannot be empty");
    }
    if let Some(category_id) = req.category_id {
        v.check(category_id >= 1, "categoryId", "Category id must be a positive integer");
    }
    v.finish()?;

    let existing = vocabularies::get(&state.db, id).await?.ok_or_else(not_found)?;
    if let Some(category_id) = req.category_id {
        ensure_category(&state, category_id).await?;
    }

    let arabic_text = req.arabic_text.as_deref().map(str::trim);
    let indonesian_text = req.indonesian_text.as_deref().map(str::trim);

    // Only regenerate when the text actually changed and no path was given
    let arabic_to_voice = arabic_text
        .filter(|t| *t != existing.arabic_text && req.arabic_voice_path.is_none());
    let indonesian_to_voice = indonesian_text
        .filter(|t| *t != existing.indonesian_text && req.indonesian_voice_path.is_none());

    let (new_arabic_voice, new_indonesian_voice) =
        synthesize_pair(&state, arabic_to_voice, indonesian_to_voice).await?;
    let uploads = [new_arabic_voice.clone(), new_indonesian_voice.clone()];

    let changes = VocabularyChanges {
        arabic_text: arabic_text.map(str::to_string),
        indonesian_text: indonesian_text.map(str::to_string),
        category_id: req.category_id,
        arabic_voice_path: req.arabic_voice_path.or(new_arabic_voice),
        indonesian_voice_path: req.indonesian_voice_path.or(new_indonesian_voice),
    };

    let updated = match vocabularies::update(&state.db, id, &changes).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            discard_uploads(&state, &uploads).await;
            return Err(not_found());
        }
        Err(e) => {
            discard_uploads(&state, &uploads).await;
            return Err(e.into());
        }
    };

    let media = state.services.media.as_ref();
    if updated.arabic_voice_path != existing.arabic_voice_path {
        delete_audio_best_effort(media, existing.arabic_voice_path.as_deref()).await;
    }
    if updated.indonesian_voice_path != existing.indonesian_voice_path {
        delete_audio_best_effort(media, existing.indonesian_voice_path.as_deref()).await;
    }

    info!(vocabulary_id = id, "Updated vocabulary");
    Ok(ok("Vocabulary updated", updated))
}

/// DELETE /api/v1/vocabularies/:id
#[utoipa::path(
    delete,
    path = "/api/v1/vocabularies/{id}",
    tag = "vocabularies",
    params(("id" = i64, Path, description = "Vocabulary id")),
    responses(
        (status = 200, description = "Entry and its audio deleted"),
        (status = 404, description = "Vocabulary not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_vocabulary(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    let deleted = vocabularies::delete(&state.db, id).await?.ok_or_else(not_found)?;

    let media = state.services.media.as_ref();
    tokio::join!(
        delete_audio_best_effort(media, deleted.arabic_voice_path.as_deref()),
        delete_audio_best_effort(media, deleted.indonesian_voice_path.as_deref()),
    );

    info!(vocabulary_id = id, "Deleted vocabulary");
    Ok(ok("Vocabulary deleted", ()))
}

pub fn vocabulary_routes() -> Router<AppState> {
    Router::new()
        .route("/vocabularies", get(list_vocabularies).post(create_vocabulary))
        .route(
            "/vocabularies/:id",
            get(get_vocabulary).put(update_vocabulary).delete(delete_vocabulary),
        )
}
