//! Integration tests for the lisan-api HTTP surface

mod helpers;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Duration;
use helpers::*;
use lisan_common::db::Role;
use serde_json::{json, Value};

async fn create_category(app: &TestApp, admin: &str) -> i64 {
    let (status, body) = app.post("/api/v1/categories", Some(admin), json!({"name": "Benda"})).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

async fn create_level(app: &TestApp, admin: &str, sequence: i64) -> i64 {
    let (status, body) = app
        .post(
            "/api/v1/levels",
            Some(admin),
            json!({"name": format!("Level {}", sequence), "sequence": sequence}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

/// Creates an exercise and returns `(exercise_id, choice ids)`
async fn create_exercise(app: &TestApp, admin: &str, level_id: Option<i64>, correct: &[bool]) -> (i64, Vec<i64>) {
    let choices: Vec<Value> = correct
        .iter()
        .enumerate()
        .map(|(i, c)| json!({"text": format!("Pilihan {}", i), "isCorrect": c}))
        .collect();

    let (status, body) = app
        .post(
            "/api/v1/exercises",
            Some(admin),
            json!({"question": "ما هذا؟", "levelId": level_id, "choices": choices}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let ids = body["data"]["choices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    (body["data"]["id"].as_i64().unwrap(), ids)
}

async fn create_lesson(app: &TestApp, admin: &str, level_id: i64, sequence: i64, content: &str) -> Value {
    let (status, body) = app
        .post(
            "/api/v1/lessons",
            Some(admin),
            json!({
                "title": format!("Pelajaran {}", sequence),
                "content": content,
                "sequence": sequence,
                "levelId": level_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lisan-api");
}

#[tokio::test]
async fn test_api_docs_served() {
    let app = create_test_app().await;

    let (status, doc) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["info"]["title"], "Lisan API");
    assert!(doc["paths"]["/api/v1/levels/{id}/submit"]["post"].is_object());
    assert!(doc["components"]["schemas"]["SubmitRequest"].is_object());

    let (status, _) = app.get("/api-docs", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_me() {
    let app = create_test_app().await;
    let credentials = json!({"username": "ahmad", "email": "ahmad@lisan.id", "password": "rahasia"});

    let (status, body) = app.post("/api/v1/auth/register", None, credentials.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "ahmad@lisan.id");
    assert_eq!(body["data"]["role"], "student");
    assert!(body["data"].get("password").is_none());

    let (status, _) = app.post("/api/v1/auth/register", None, credentials).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/v1/auth/login", None, json!({"email": "ahmad@lisan.id", "password": "salah!!"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (stored,): (String,) = sqlx::query_as("SELECT password FROM users WHERE email = ?")
        .bind("ahmad@lisan.id")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(stored.starts_with("$2b$10$"), "{}", stored);
    assert!(!stored.contains("rahasia"));

    let (status, body) = app
        .post("/api/v1/auth/login", None, json!({"email": "ahmad@lisan.id", "password": "rahasia"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ahmad@lisan.id");
    assert_eq!(body["data"]["role"], "student");
    assert!(body["data"]["userId"].as_i64().is_some());
}

#[tokio::test]
async fn test_register_validation_lists_fields() {
    let app = create_test_app().await;
    let (status, body) = app
        .post("/api/v1/auth/register", None, json!({"username": "ab", "email": "bukan-email", "password": "123"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    for field in ["username", "email", "password"] {
        assert!(body["errors"][field].is_array(), "missing error for {}", field);
    }
}

#[tokio::test]
async fn test_token_and_role_gating() {
    let app = create_test_app().await;
    let body = json!({"name": "Kata Kerja"});

    let (status, _) = app.post("/api/v1/categories", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/v1/categories", Some("forged.token"), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let expired = token_for(1, "x@lisan.id", Role::Admin, Duration::hours(-1));
    let (status, _) = app.post("/api/v1/categories", Some(&expired), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let student = app.student_token().await;
    let (status, _) = app.post("/api/v1/categories", Some(&student), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.admin_token().await;
    let (status, _) = app.post("/api/v1/categories", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_profile_update_and_account_deletion() {
    let app = create_test_app().await;
    let (_, token) = app.user_with_token("murid@lisan.id", Role::Student).await;

    let (status, body) = app.put("/api/v1/users/me", Some(&token), json!({"avatar": "not a url"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["avatar"].is_array());

    let (status, body) = app
        .put(
            "/api/v1/users/me",
            Some(&token),
            json!({"username": "murid baru", "avatar": "https://cdn.lisan.id/a.png"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "murid baru");
    assert_eq!(body["data"]["avatar"], "https://cdn.lisan.id/a.png");

    let (status, _) = app.delete("/api/v1/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/v1/auth/login", None, json!({"email": "murid@lisan.id", "password": "rahasia123"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_vocabulary_generates_both_voices() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let category_id = create_category(&app, &admin).await;

    let (status, body) = app
        .post(
            "/api/v1/vocabularies",
            Some(&admin),
            json!({"arabicText": "كتاب", "indonesianText": "buku", "categoryId": category_id}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let arabic = body["data"]["arabicVoicePath"].as_str().unwrap();
    let indonesian = body["data"]["indonesianVoicePath"].as_str().unwrap();
    assert!(!arabic.is_empty());
    assert!(!indonesian.is_empty());
    assert_ne!(arabic, indonesian);
    assert_eq!(app.speech.calls.load(std::sync::atomic::Ordering::SeqCst), 2);

    let id = body["data"]["id"].as_i64().unwrap();
    let (status, body) = app.get(&format!("/api/v1/vocabularies/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"]["name"], "Benda");
}

#[tokio::test]
async fn test_vocabulary_update_replaces_changed_voice() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let category_id = create_category(&app, &admin).await;

    let (_, created) = app
        .post(
            "/api/v1/vocabularies",
            Some(&admin),
            json!({"arabicText": "قلم", "indonesianText": "pena", "categoryId": category_id}),
        )
        .await;
    let id = created["data"]["id"].as_i64().unwrap();
    let old_indonesian = created["data"]["indonesianVoicePath"].as_str().unwrap().to_string();
    let old_arabic = created["data"]["arabicVoicePath"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(&format!("/api/v1/vocabularies/{}", id), Some(&admin), json!({"indonesianText": "pulpen"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["arabicVoicePath"], old_arabic.as_str());
    assert_ne!(body["data"]["indonesianVoicePath"], old_indonesian.as_str());
    assert_eq!(app.media.deleted(), vec![old_indonesian]);

    let (status, _) = app.delete(&format!("/api/v1/vocabularies/{}", id), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.media.deleted().len(), 3);
}

#[tokio::test]
async fn test_failed_voice_is_500_and_discards_other_upload() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let category_id = create_category(&app, &admin).await;

    let (status, body) = app
        .post(
            "/api/v1/vocabularies",
            Some(&admin),
            json!({"arabicText": "كتاب", "indonesianText": FAILING_TEXT, "categoryId": category_id}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert!(!body.to_string().contains("quota"));
    assert_eq!(app.media.deleted(), vec!["https://media.test/audio-1.mp3".to_string()]);

    let (_, body) = app.get("/api/v1/vocabularies", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Same on update: the new Arabic upload is removed and the row is unchanged
    let (_, created) = app
        .post(
            "/api/v1/vocabularies",
            Some(&admin),
            json!({"arabicText": "قلم", "indonesianText": "pena", "categoryId": category_id}),
        )
        .await;
    let id = created["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .put(
            &format!("/api/v1/vocabularies/{}", id),
            Some(&admin),
            json!({"arabicText": "مسطرة", "indonesianText": FAILING_TEXT}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        app.media.deleted(),
        vec![
            "https://media.test/audio-1.mp3".to_string(),
            "https://media.test/audio-4.mp3".to_string(),
        ]
    );

    let (_, body) = app.get(&format!("/api/v1/vocabularies/{}", id), None).await;
    assert_eq!(body["data"]["arabicText"], "قلم");
    assert_eq!(body["data"]["arabicVoicePath"], created["data"]["arabicVoicePath"]);
}

#[tokio::test]
async fn test_vocabulary_with_unknown_category_rejected() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .post(
            "/api/v1/vocabularies",
            Some(&admin),
            json!({"arabicText": "باب", "indonesianText": "pintu", "categoryId": 99}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_with_vocabulary_cannot_be_deleted() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let category_id = create_category(&app, &admin).await;
    app.post(
        "/api/v1/vocabularies",
        Some(&admin),
        json!({"arabicText": "بيت", "indonesianText": "rumah", "categoryId": category_id}),
    )
    .await;

    let (status, body) = app.get(&format!("/api/v1/categories/{}", category_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vocabularies"].as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&format!("/api/v1/categories/{}", category_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.delete("/api/v1/categories/999", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_level_delete_renumbers_and_duplicate_sequence_conflicts() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;

    let mut ids = Vec::new();
    for seq in 1..=4 {
        ids.push(create_level(&app, &admin, seq).await);
    }

    let (status, _) = app
        .post("/api/v1/levels", Some(&admin), json!({"name": "Duplikat", "sequence": 2}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.delete(&format!("/api/v1/levels/{}", ids[2]), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.delete(&format!("/api/v1/levels/{}", ids[2]), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/v1/levels", Some(&admin)).await;
    let levels = body["data"].as_array().unwrap();
    let sequences: Vec<i64> = levels.iter().map(|l| l["sequence"].as_i64().unwrap()).collect();
    let level_ids: Vec<i64> = levels.iter().map(|l| l["id"].as_i64().unwrap()).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(level_ids, vec![ids[0], ids[1], ids[3]]);
}

#[tokio::test]
async fn test_level_description_cleared_by_null() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;

    let (_, created) = app
        .post(
            "/api/v1/levels",
            Some(&admin),
            json!({"name": "Dasar", "description": "Huruf hijaiyah", "sequence": 1}),
        )
        .await;
    let uri = format!("/api/v1/levels/{}", created["data"]["id"]);

    let (status, body) = app.put(&uri, Some(&admin), json!({"name": "Dasar 1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Huruf hijaiyah");

    let (status, body) = app.put(&uri, Some(&admin), json!({"description": null})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["description"].is_null());
    assert_eq!(body["data"]["name"], "Dasar 1");
}

#[tokio::test]
async fn test_submission_scores_and_unlocks_next_level() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let student = app.student_token().await;

    let first = create_level(&app, &admin, 1).await;
    let second = create_level(&app, &admin, 2).await;
    create_level(&app, &admin, 3).await;

    let (single, single_choices) = create_exercise(&app, &admin, Some(first), &[true, false]).await;
    let (multi, multi_choices) = create_exercise(&app, &admin, Some(first), &[true, true, false]).await;
    let (_, _) = create_exercise(&app, &admin, Some(first), &[false, true]).await;

    let (_, body) = app.get("/api/v1/levels", Some(&student)).await;
    let statuses: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["unlocked", "locked", "locked"]);

    // One exact match, one partial answer, one unanswered
    let (status, body) = app
        .post(
            &format!("/api/v1/levels/{}/submit", first),
            Some(&student),
            json!({"submissions": [
                {"exerciseId": single, "answerIds": [single_choices[0]]},
                {"exerciseId": multi, "answerIds": [multi_choices[0]]},
                {"exerciseId": 9999, "answerIds": [1]},
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["levelId"], first);
    assert_eq!(body["data"]["totalQuestions"], 3);
    assert_eq!(body["data"]["correctlyAnsweredQuestions"], 1);
    assert_eq!(body["data"]["score"], 33);
    assert_eq!(body["data"]["status"], "completed");

    let (_, body) = app.get("/api/v1/levels", Some(&student)).await;
    let levels = body["data"].as_array().unwrap();
    assert_eq!(levels[0]["status"], "completed");
    assert_eq!(levels[1]["id"], second);
    assert_eq!(levels[1]["status"], "unlocked");
    assert_eq!(levels[2]["status"], "locked");
}

#[tokio::test]
async fn test_repeated_answer_ids_are_not_collapsed() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let student = app.student_token().await;
    let level = create_level(&app, &admin, 1).await;
    let (exercise, choices) = create_exercise(&app, &admin, Some(level), &[true, false]).await;

    let (status, body) = app
        .post(
            &format!("/api/v1/levels/{}/submit", level),
            Some(&student),
            json!({"submissions": [{"exerciseId": exercise, "answerIds": [choices[0], choices[0]]}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["correctlyAnsweredQuestions"], 0);
    assert_eq!(body["data"]["score"], 0);
}

#[tokio::test]
async fn test_submission_to_level_without_exercises_fails() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let student = app.student_token().await;
    let level = create_level(&app, &admin, 1).await;

    let (status, body) = app
        .post(
            &format!("/api/v1/levels/{}/submit", level),
            Some(&student),
            json!({"submissions": []}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["submissions"].is_array());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_level_progress")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let (status, _) = app
        .post("/api/v1/levels/999/submit", Some(&student), json!({"submissions": []}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            &format!("/api/v1/levels/{}/submit", level),
            Some(&student),
            json!({"submissions": [{"exerciseId": 1, "answerIds": []}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["submissions.0.answerIds"].is_array());
}

#[tokio::test]
async fn test_exercise_choice_rules() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/v1/exercises",
            Some(&admin),
            json!({"question": "Satu pilihan?", "choices": [{"text": "ya", "isCorrect": true}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["choices"].is_array());

    let (status, _) = app
        .post(
            "/api/v1/exercises",
            Some(&admin),
            json!({"question": "Tanpa benar?", "choices": [
                {"text": "a", "isCorrect": false},
                {"text": "b", "isCorrect": false},
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/v1/exercises",
            Some(&admin),
            json!({"question": "Level hilang", "levelId": 42, "choices": [
                {"text": "a", "isCorrect": true},
                {"text": "b", "isCorrect": false},
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_final_exam_and_exercise_lifecycle() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let student = app.student_token().await;
    let level = create_level(&app, &admin, 1).await;

    create_exercise(&app, &admin, Some(level), &[true, false]).await;
    let (final_id, _) = create_exercise(&app, &admin, None, &[false, true]).await;

    let (status, body) = app.get("/api/v1/exercises/final", Some(&student)).await;
    assert_eq!(status, StatusCode::OK);
    let finals = body["data"].as_array().unwrap();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0]["id"], final_id);
    assert_eq!(finals[0]["type"], "MULTIPLE_CHOICE");
    assert_eq!(finals[0]["choices"].as_array().unwrap().len(), 2);

    // Moving it into a level removes it from the final exam
    let (status, body) = app
        .put(&format!("/api/v1/exercises/{}", final_id), Some(&admin), json!({"levelId": level}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["levelId"], level);

    let (_, body) = app.get("/api/v1/exercises/final", Some(&student)).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app
        .get(&format!("/api/v1/levels/{}?include=exercises", level), Some(&student))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["exercises"].as_array().unwrap().len(), 2);
    assert!(body["data"].get("lessons").is_none());

    let (status, _) = app.delete(&format!("/api/v1/exercises/{}", final_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/v1/exercises/{}", final_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_lesson_is_narrated_inline() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let level = create_level(&app, &admin, 1).await;

    let lesson = create_lesson(&app, &admin, level, 1, "مرحبا").await;
    assert_eq!(lesson["audioStatus"], "COMPLETED");
    assert!(lesson["voicePath"].as_str().unwrap().starts_with("https://media.test/"));

    let (status, _) = app
        .post(
            "/api/v1/lessons",
            Some(&admin),
            json!({"title": "Dup", "content": "نص", "sequence": 1, "levelId": level}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "/api/v1/lessons",
            Some(&admin),
            json!({"title": "Yatim", "content": "نص", "sequence": 1, "levelId": 777}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_long_lesson_is_narrated_by_job_queue() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let level = create_level(&app, &admin, 1).await;

    let content = "السلام عليكم ورحمة الله. ".repeat(8);
    assert!(content.len() > LONG_TEXT_THRESHOLD);

    let lesson = create_lesson(&app, &admin, level, 1, &content).await;
    assert_eq!(lesson["audioStatus"], "PROCESSING");
    assert!(lesson["audioOperationId"].is_string());
    let id = lesson["id"].as_i64().unwrap();

    let mut last = Value::Null;
    for _ in 0..100 {
        let (_, body) = app.get(&format!("/api/v1/lessons/{}", id), None).await;
        last = body["data"].clone();
        if last["audioStatus"] == "COMPLETED" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(last["audioStatus"], "COMPLETED");
    assert!(last["voicePath"].as_str().unwrap().starts_with("https://media.test/"));
    assert!(last["audioOperationId"].is_null());
    assert_eq!(last["level"]["id"], level);
}

#[tokio::test]
async fn test_lesson_delete_renumbers_and_removes_audio() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let level = create_level(&app, &admin, 1).await;

    let first = create_lesson(&app, &admin, level, 1, "واحد").await;
    create_lesson(&app, &admin, level, 2, "اثنان").await;
    create_lesson(&app, &admin, level, 3, "ثلاثة").await;

    let (status, _) = app
        .delete(&format!("/api/v1/lessons/{}", first["id"]), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.media.deleted(), vec![first["voicePath"].as_str().unwrap().to_string()]);

    let (status, body) = app.get(&format!("/api/v1/lessons/level/{}", level), None).await;
    assert_eq!(status, StatusCode::OK);
    let sequences: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["sequence"].as_i64().unwrap())
        .collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test]
async fn test_lesson_unlock_chain_follows_completion() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let student = app.student_token().await;
    let level = create_level(&app, &admin, 1).await;

    let first = create_lesson(&app, &admin, level, 1, "أ").await;
    create_lesson(&app, &admin, level, 2, "ب").await;
    create_lesson(&app, &admin, level, 3, "ت").await;

    let uri = format!("/api/v1/levels/{}?include=lessons", level);
    let lesson_statuses = |body: &Value| -> Vec<String> {
        body["data"]["lessons"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["status"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = app.get(&uri, Some(&student)).await;
    assert_eq!(lesson_statuses(&body), vec!["unlocked", "locked", "locked"]);

    let (status, body) = app
        .post(&format!("/api/v1/lessons/{}/complete", first["id"]), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (_, body) = app.get(&uri, Some(&student)).await;
    assert_eq!(lesson_statuses(&body), vec!["completed", "unlocked", "locked"]);
}

#[tokio::test]
async fn test_storage_webhook() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let level = create_level(&app, &admin, 1).await;
    let lesson = create_lesson(&app, &admin, level, 1, "درس").await;
    let lesson_id = lesson["id"].as_i64().unwrap();

    let notify = |name: &str| {
        let data = STANDARD.encode(json!({"name": name, "bucket": BUCKET}).to_string());
        json!({"message": {"data": data}})
    };
    let uri = format!("/api/v1/webhooks/gcs-tts-complete/{}", WEBHOOK_SECRET);

    let (status, _) = app
        .post("/api/v1/webhooks/gcs-tts-complete/wrong", None, notify("lesson-1-audio.mp3"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Same length as the configured secret, last byte differs
    let (status, _) = app
        .post("/api/v1/webhooks/gcs-tts-complete/hook-secreT", None, notify("lesson-1-audio.mp3"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post(&uri, None, json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.post(&uri, None, notify(&format!("lesson-{}-audio.txt", lesson_id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.post(&uri, None, notify("cover.mp3")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let name = format!("lesson-{}-audio.mp3", lesson_id);
    let (status, _) = app.post(&uri, None, notify(&name)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get(&format!("/api/v1/lessons/{}", lesson_id), None).await;
    assert_eq!(
        body["data"]["voicePath"],
        format!("https://storage.googleapis.com/{}/{}", BUCKET, name)
    );
    assert_eq!(body["data"]["audioStatus"], "COMPLETED");

    let (status, _) = app.post(&uri, None, notify("lesson-9999-audio.mp3")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn multipart_request(token: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "lisan-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"scan.png\"\r\nContent-Type: image/png\r\n\r\n",
            b = boundary,
            f = field
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/ocr/scan")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_ocr_scan() {
    let app = create_test_app().await;
    let student = app.student_token().await;

    let (status, body) = app.send(multipart_request(&student, "image", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["text"], OCR_TEXT);

    let (status, _) = app.send(multipart_request(&student, "document", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = vec![0u8; 5 * 1024 * 1024 + 1];
    let (status, _) = app.send(multipart_request(&student, "image", &oversized)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
