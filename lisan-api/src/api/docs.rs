//! OpenAPI document and Swagger UI
//!
//! Response schemas describe the `data` member of the success envelope.

use super::{
    auth, categories, exercises, extractors, health, lessons, levels, ocr, users, vocabularies,
    webhooks,
};
use crate::db::exercises::ExerciseWithChoices;
use crate::db::lessons::LessonWithLevel;
use crate::db::vocabularies::VocabularyWithCategory;
use crate::AppState;
use axum::{response::Html, routing::get, Json, Router};
use lisan_common::db::{
    AnswerChoice, AudioStatus, Category, Exercise, Lesson, Level, ProgressStatus, Role, User,
    UserLessonProgress, Vocabulary,
};
use lisan_common::learning::Submission;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lisan API",
        description = "Arabic and Indonesian vocabulary, lessons and exercises. \
            Successful responses are wrapped as {\"message\": ..., \"data\": ...}; \
            errors carry {\"success\": false, \"message\": ..., \"errors\": ...}."
    ),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        users::update_me,
        users::delete_me,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        vocabularies::list_vocabularies,
        vocabularies::get_vocabulary,
        vocabularies::create_vocabulary,
        vocabularies::update_vocabulary,
        vocabularies::delete_vocabulary,
        levels::list_levels,
        levels::get_level,
        levels::create_level,
        levels::update_level,
        levels::delete_level,
        levels::submit_level,
        lessons::list_lessons,
        lessons::get_lesson,
        lessons::list_lessons_by_level,
        lessons::create_lesson,
        lessons::update_lesson,
        lessons::delete_lesson,
        lessons::complete_lesson,
        exercises::final_exam,
        exercises::get_exercise,
        exercises::create_exercise,
        exercises::update_exercise,
        exercises::delete_exercise,
        ocr::scan_image,
        webhooks::storage_notification,
    ),
    components(schemas(
        Role,
        User,
        Category,
        Vocabulary,
        Level,
        AudioStatus,
        Lesson,
        Exercise,
        AnswerChoice,
        ProgressStatus,
        UserLessonProgress,
        Submission,
        VocabularyWithCategory,
        LessonWithLevel,
        ExerciseWithChoices,
        health::HealthResponse,
        extractors::AuthUser,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::LoginResponse,
        users::UpdateProfileRequest,
        categories::CategoryRequest,
        categories::CategoryDetail,
        vocabularies::CreateVocabularyRequest,
        vocabularies::UpdateVocabularyRequest,
        levels::LevelWithStatus,
        levels::LessonWithStatus,
        levels::LevelDetail,
        levels::CreateLevelRequest,
        levels::UpdateLevelRequest,
        levels::SubmitRequest,
        levels::SubmitResponse,
        lessons::CreateLessonRequest,
        lessons::UpdateLessonRequest,
        exercises::ChoiceRequest,
        exercises::CreateExerciseRequest,
        exercises::UpdateExerciseRequest,
        ocr::ScanForm,
        ocr::OcrText,
        ocr::OcrResponse,
        webhooks::PushEnvelope,
        webhooks::PushMessage,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health"),
        (name = "auth", description = "Registration and tokens"),
        (name = "users", description = "Own profile"),
        (name = "categories", description = "Dictionary categories"),
        (name = "vocabularies", description = "Dictionary entries with audio"),
        (name = "levels", description = "Levels, unlock state and submissions"),
        (name = "lessons", description = "Lessons and narration"),
        (name = "exercises", description = "Multiple-choice questions"),
        (name = "ocr", description = "Arabic text recognition"),
        (name = "webhooks", description = "Storage notifications")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected operations
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

const SWAGGER_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Lisan API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({ url: "/api-docs/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// GET /api-docs
pub async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_PAGE)
}

pub fn docs_routes() -> Router<AppState> {
    Router::new()
        .route(OPENAPI_PATH, get(openapi_json))
        .route("/api-docs", get(swagger_ui))
}
