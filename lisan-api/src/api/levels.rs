//! Levels, per-user unlock state and level submissions

use super::validation::{double_option, Validator};
use super::{created, ok, AdminUser, AuthUser, Envelope, Id, JsonBody};
use crate::db::exercises::{self, ExerciseWithChoices};
use crate::db::levels::{self, LevelChanges, NewLevel};
use crate::db::{lessons, progress};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lisan_common::db::{Lesson, Level, ProgressStatus};
use lisan_common::learning::{derive_statuses, score_submissions, Submission};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SEQUENCE_TAKEN: &str = "Sequence number is already used by another level";

#[derive(Debug, Serialize, ToSchema)]
pub struct LevelWithStatus {
    #[serde(flatten)]
    pub level: Level,
    pub status: ProgressStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LessonWithStatus {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub status: ProgressStatus,
}

/// Level with the optional `include` expansions
#[derive(Debug, Serialize, ToSchema)]
pub struct LevelDetail {
    #[serde(flatten)]
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons: Option<Vec<LessonWithStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Vec<ExerciseWithChoices>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IncludeQuery {
    /// Comma-separated: `lessons`, `exercises`
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLevelRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub sequence: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLevelRequest {
    pub name: Option<String>,
    /// Explicit `null` clears it
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub sequence: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub level_id: i64,
    pub total_questions: usize,
    pub correctly_answered_questions: usize,
    pub score: i64,
    pub status: ProgressStatus,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Level not found".to_string())
}

fn map_sequence_conflict(e: lisan_common::Error) -> ApiError {
    if e.is_unique_violation() {
        ApiError::Conflict(SEQUENCE_TAKEN.to_string())
    } else {
        e.into()
    }
}

/// GET /api/v1/levels
#[utoipa::path(
    get,
    path = "/api/v1/levels",
    tag = "levels",
    responses((status = 200, description = "Levels with the caller's status", body = [LevelWithStatus])),
    security(("bearer_auth" = []))
)]
pub async fn list_levels(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<LevelWithStatus>>>> {
    let levels = levels::list(&state.db).await?;
    let stored = progress::level_statuses_for_user(&state.db, user.user_id).await?;

    let rows: Vec<_> = levels.iter().map(|l| stored.get(&l.id).copied()).collect();
    let levels = levels
        .into_iter()
        .zip(derive_statuses(&rows))
        .map(|(level, status)| LevelWithStatus { level, status })
        .collect();

    Ok(ok("Levels retrieved", levels))
}

/// GET /api/v1/levels/:id?include=lessons,exercises
#[utoipa::path(
    get,
    path = "/api/v1/levels/{id}",
    tag = "levels",
    params(("id" = i64, Path, description = "Level id"), IncludeQuery),
    responses(
        (status = 200, description = "Level with requested expansions", body = LevelDetail),
        (status = 404, description = "Level not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_level(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
    Query(query): Query<IncludeQuery>,
) -> ApiResult<Json<Envelope<LevelDetail>>> {
    let level = levels::get(&state.db, id).await?.ok_or_else(not_found)?;

    let includes: Vec<&str> = query
        .include
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .collect();

    let lessons = if includes.contains(&"lessons") {
        let lessons = lessons::list_by_level(&state.db, id).await?;
        let stored = progress::lesson_statuses_for_user(&state.db, user.user_id, id).await?;
        let rows: Vec<_> = lessons.iter().map(|l| stored.get(&l.id).copied()).collect();

        Some(
            lessons
                .into_iter()
                .zip(derive_statuses(&rows))
                .map(|(lesson, status)| LessonWithStatus { lesson, status })
                .collect(),
        )
    } else {
        None
    };

    let exercises = if includes.contains(&"exercises") {
        Some(exercises::list_by_level_with_choices(&state.db, id).await?)
    } else {
        None
    };

    Ok(ok(
        "Level retrieved",
        LevelDetail {
            level,
            lessons,
            exercises,
        },
    ))
}

/// POST /api/v1/levels
#[utoipa::path(
    post,
    path = "/api/v1/levels",
    tag = "levels",
    request_body = CreateLevelRequest,
    responses(
        (status = 201, description = "Level created", body = Level),
        (status = 409, description = "Sequence already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_level(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(req): JsonBody<CreateLevelRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Level>>)> {
    let mut v = Validator::new();
    v.min_chars("name", &req.name, 3, "Level name must be at least 3 characters")
        .check(req.sequence >= 1, "sequence", "Sequence must be a positive integer");
    v.finish()?;

    let level = levels::create(
        &state.db,
        &NewLevel {
            name: req.name.trim().to_string(),
            description: req.description,
            sequence: req.sequence,
        },
    )
    .await
    .map_err(map_sequence_conflict)?;

    info!(level_id = level.id, sequence = level.sequence, "Created level");
    Ok(created("Level created", level))
}

/// PUT /api/v1/levels/:id
#[utoipa::path(
    put,
    path = "/api/v1/levels/{id}",
    tag = "levels",
    params(("id" = i64, Path, description = "Level id")),
    request_body = UpdateLevelRequest,
    responses(
        (status = 200, description = "Level updated", body = Level),
        (status = 404, description = "Level not found"),
        (status = 409, description = "Sequence already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_level(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    JsonBody(req): JsonBody<UpdateLevelRequest>,
) -> ApiResult<Json<Envelope<Level>>> {
    let mut v = Validator::new();
    if let Some(name) = &req.name {
        v.min_chars("name", name, 3, "Level name must be at least 3 characters");
    }
    if let Some(sequence) = req.sequence {
        v.check(sequence >= 1, "sequence", "Sequence must be a positive integer");
    }
    v.finish()?;

    let changes = LevelChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        sequence: req.sequence,
    };

    let level = levels::update(&state.db, id, &changes)
        .await
        .map_err(map_sequence_conflict)?
        .ok_or_else(not_found)?;

    Ok(ok("Level updated", level))
}

/// DELETE /api/v1/levels/:id
#[utoipa::path(
    delete,
    path = "/api/v1/levels/{id}",
    tag = "levels",
    params(("id" = i64, Path, description = "Level id")),
    responses(
        (status = 200, description = "Level deleted, later levels renumbered"),
        (status = 404, description = "Level not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_level(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    levels::delete_with_renumber(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ok("Level deleted", ()))
}

/// POST /api/v1/levels/:id/submit
///
/// Grades every exercise of the level and records the score as the
/// caller's completed progress for it.
#[utoipa::path(
    post,
    path = "/api/v1/levels/{id}/submit",
    tag = "levels",
    params(("id" = i64, Path, description = "Level id")),
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Score recorded", body = SubmitResponse),
        (status = 400, description = "Level has no exercises"),
        (status = 404, description = "Level not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_level(
    State(state): State<AppState>,
    user: AuthUser,
    Id(level_id): Id,
    JsonBody(req): JsonBody<SubmitRequest>,
) -> ApiResult<Json<Envelope<SubmitResponse>>> {
    let mut v = Validator::new();
    for (i, submission) in req.submissions.iter().enumerate() {
        v.check(
            submission.exercise_id >= 1,
            &format!("submissions.{}.exerciseId", i),
            "Exercise id must be a positive integer",
        )
        .check(
            !submission.answer_ids.is_empty(),
            &format!("submissions.{}.answerIds", i),
            "At least one answer must be selected for each question",
        )
        .check(
            submission.answer_ids.iter().all(|id| *id >= 1),
            &format!("submissions.{}.answerIds", i),
            "Answer ids must be positive integers",
        );
    }
    v.finish()?;

    if !levels::exists(&state.db, level_id).await? {
        return Err(not_found());
    }

    let correct_sets = exercises::correct_sets_for_level(&state.db, level_id).await?;
    let summary = score_submissions(&correct_sets, &req.submissions)
        .map_err(|e| match e {
            lisan_common::Error::InvalidInput(msg) => ApiError::field("submissions", msg),
            other => other.into(),
        })?;

    let progress =
        progress::upsert_level_completion(&state.db, user.user_id, level_id, summary.score).await?;

    info!(
        user_id = user.user_id,
        level_id,
        correct = summary.correctly_answered,
        total = summary.total_questions,
        score = summary.score,
        "Level submitted"
    );

    Ok(ok(
        "Submission graded",
        SubmitResponse {
            level_id,
            total_questions: summary.total_questions,
            correctly_answered_questions: summary.correctly_answered,
            score: summary.score,
            status: progress.status,
        },
    ))
}

pub fn level_routes() -> Router<AppState> {
    Router::new()
        .route("/levels", get(list_levels).post(create_level))
        .route(
            "/levels/:id",
            get(get_level).put(update_level).delete(delete_level),
        )
        .route("/levels/:id/submit", post(submit_level))
}
