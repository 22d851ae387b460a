//! Exercises with answer choices; `levelId: null` marks the final exam

use super::validation::{double_option, Validator};
use super::{created, ok, AdminUser, AuthUser, Envelope, Id, JsonBody};
use crate::db::exercises::{
    self, ExerciseChanges, ExerciseWithChoices, NewChoice, NewExercise, DEFAULT_EXERCISE_TYPE,
};
use crate::db::levels;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRequest {
    #[serde(default)]
    pub text: String,
    pub voice_path: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExerciseRequest {
    #[serde(default)]
    pub question: String,
    #[serde(rename = "type")]
    pub exercise_type: Option<String>,
    pub voice_path: Option<String>,
    pub level_id: Option<i64>,
    #[serde(default)]
    pub choices: Vec<ChoiceRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExerciseRequest {
    pub question: Option<String>,
    #[serde(rename = "type")]
    pub exercise_type: Option<String>,
    pub voice_path: Option<String>,
    /// Explicit `null` moves the exercise to the final exam
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub level_id: Option<Option<i64>>,
    pub choices: Option<Vec<ChoiceRequest>>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Exercise not found".to_string())
}

fn validate_choices(v: &mut Validator, choices: &[ChoiceRequest]) {
    v.check(choices.len() >= 2, "choices", "At least 2 answer choices are required")
        .check(
            choices.iter().any(|c| c.is_correct),
            "choices",
            "At least one answer choice must be marked correct",
        );
    for (i, choice) in choices.iter().enumerate() {
        v.min_chars(
            &format!("choices.{}.text", i),
            &choice.text,
            1,
            "Answer text cannot be empty",
        );
    }
}

fn to_new_choices(choices: Vec<ChoiceRequest>) -> Vec<NewChoice> {
    choices
        .into_iter()
        .map(|c| NewChoice {
            text: c.text.trim().to_string(),
            voice_path: c.voice_path,
            is_correct: c.is_correct,
        })
        .collect()
}

async fn ensure_level(state: &AppState, level_id: Option<i64>) -> ApiResult<()> {
    if let Some(level_id) = level_id {
        if !levels::exists(&state.db, level_id).await? {
            return Err(ApiError::BadRequest("Level does not exist".to_string()));
        }
    }
    Ok(())
}

/// GET /api/v1/exercises/final
#[utoipa::path(
    get,
    path = "/api/v1/exercises/final",
    tag = "exercises",
    responses((status = 200, description = "Final-exam questions", body = [ExerciseWithChoices])),
    security(("bearer_auth" = []))
)]
pub async fn final_exam(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<ExerciseWithChoices>>>> {
    let exercises = exercises::list_final(&state.db).await?;
    Ok(ok("Final exam retrieved", exercises))
}

/// GET /api/v1/exercises/:id
#[utoipa::path(
    get,
    path = "/api/v1/exercises/{id}",
    tag = "exercises",
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise with choices", body = ExerciseWithChoices),
        (status = 404, description = "Exercise not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_exercise(
    State(state): State<AppState>,
    _user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<ExerciseWithChoices>>> {
    let exercise = exercises::get_with_choices(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ok("Exercise retrieved", exercise))
}

/// POST /api/v1/exercises
#[utoipa::path(
    post,
    path = "/api/v1/exercises",
    tag = "exercises",
    request_body = CreateExerciseRequest,
    responses(
        (status = 201, description = "Exercise created", body = ExerciseWithChoices),
        (status = 400, description = "Invalid fields or unknown level")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_exercise(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(req): JsonBody<CreateExerciseRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<ExerciseWithChoices>>)> {
    let mut v = Validator::new();
    v.min_chars("question", &req.question, 1, "Question cannot be empty");
    if let Some(level_id) = req.level_id {
        v.check(level_id >= 1, "levelId", "Level id must be a positive integer");
    }
    validate_choices(&mut v, &req.choices);
    v.finish()?;

    ensure_level(&state, req.level_id).await?;

    let new = NewExercise {
        question: req.question.trim().to_string(),
        exercise_type: req
            .exercise_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXERCISE_TYPE.to_string()),
        voice_path: req.voice_path,
        level_id: req.level_id,
        choices: to_new_choices(req.choices),
    };

    let exercise = exercises::create(&state.db, &new).await?;
    Ok(created("Exercise created", exercise))
}

/// PUT /api/v1/exercises/:id
#[utoipa::path(
    put,
    path = "/api/v1/exercises/{id}",
    tag = "exercises",
    params(("id" = i64, Path, description = "Exercise id")),
    request_body = UpdateExerciseRequest,
    responses(
        (status = 200, description = "Exercise updated", body = ExerciseWithChoices),
        (status = 404, description = "Exercise not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_exercise(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
    JsonBody(req): JsonBody<UpdateExerciseRequest>,
) -> ApiResult<Json<Envelope<ExerciseWithChoices>>> {
    let mut v = Validator::new();
    if let Some(question) = &req.question {
        v.min_chars("question", question, 1, "Question cannot be empty");
    }
    if let Some(Some(level_id)) = req.level_id {
        v.check(level_id >= 1, "levelId", "Level id must be a positive integer");
    }
    if let Some(choices) = &req.choices {
        validate_choices(&mut v, choices);
    }
    v.finish()?;

    ensure_level(&state, req.level_id.flatten()).await?;

    let changes = ExerciseChanges {
        question: req.question.map(|q| q.trim().to_string()),
        exercise_type: req.exercise_type.filter(|t| !t.trim().is_empty()),
        voice_path: req.voice_path,
        level_id: req.level_id,
        choices: req.choices.map(to_new_choices),
    };

    let exercise = exercises::update(&state.db, id, &changes)
        .await?
        .ok_or_else(not_found)?;

    info!(exercise_id = id, "Updated exercise");
    Ok(ok("Exercise updated", exercise))
}

/// DELETE /api/v1/exercises/:id
#[utoipa::path(
    delete,
    path = "/api/v1/exercises/{id}",
    tag = "exercises",
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise deleted"),
        (status = 404, description = "Exercise not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_exercise(
    State(state): State<AppState>,
    _admin: AdminUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    if !exercises::delete(&state.db, id).await? {
        return Err(not_found());
    }

    info!(exercise_id = id, "Deleted exercise");
    Ok(ok("Exercise deleted", ()))
}

pub fn exercise_routes() -> Router<AppState> {
    Router::new()
        .route("/exercises", post(create_exercise))
        .route("/exercises/final", get(final_exam))
        .route(
            "/exercises/:id",
            get(get_exercise).put(update_exercise).delete(delete_exercise),
        )
}
