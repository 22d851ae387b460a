//! Shared fixtures for lisan-api integration tests
//!
//! Builds the full router over an in-memory database with fake speech,
//! storage, OCR and stitching providers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use lisan_api::services::{
    AudioStitcher, MediaStore, ServiceError, ServiceResult, Services, SpeechSynthesizer, TextRecognizer,
    VoiceLanguage,
};
use lisan_api::{AppState, AuthSettings, WebhookSettings};
use lisan_common::auth::{hash_password_with_cost, issue_token, Claims};
use lisan_common::db::{init_memory_database, Role};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const TOKEN_SECRET: &str = "integration-test-secret";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const BUCKET: &str = "lisan-audio";
/// Lesson content above this many bytes goes through the job queue
pub const LONG_TEXT_THRESHOLD: usize = 64;
pub const OCR_TEXT: &str = "بسم الله";
/// Text containing this marker makes the fake synthesizer fail
pub const FAILING_TEXT: &str = "GAGAL";

pub struct FakeSpeech {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, language: VoiceLanguage) -> ServiceResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(FAILING_TEXT) {
            return Err(ServiceError::Api(503, "quota exceeded".to_string()));
        }
        Ok(format!("{}:{}", language.code(), text).into_bytes())
    }
}

#[derive(Default)]
pub struct FakeMedia {
    uploads: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload_audio(&self, _audio: Vec<u8>) -> ServiceResult<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://media.test/audio-{}.mp3", n))
    }

    async fn delete_audio(&self, url: &str) -> ServiceResult<()> {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(url.to_string());
        }
        Ok(())
    }
}

pub struct FakeOcr;

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize_arabic(&self, _image: &[u8], _content_type: &str) -> ServiceResult<String> {
        Ok(OCR_TEXT.to_string())
    }
}

pub struct ConcatStitcher;

#[async_trait]
impl AudioStitcher for ConcatStitcher {
    async fn stitch(&self, chunks: Vec<Vec<u8>>) -> ServiceResult<Vec<u8>> {
        Ok(chunks.concat())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub speech: Arc<FakeSpeech>,
    pub media: Arc<FakeMedia>,
}

pub async fn create_test_app() -> TestApp {
    let pool = init_memory_database().await.unwrap();
    let speech = Arc::new(FakeSpeech {
        calls: AtomicUsize::new(0),
    });
    let media = Arc::new(FakeMedia::default());

    let services = Services {
        speech: speech.clone(),
        media: media.clone(),
        ocr: Arc::new(FakeOcr),
        stitcher: Arc::new(ConcatStitcher),
    };

    let state = AppState::new(
        pool.clone(),
        AuthSettings {
            token_secret: TOKEN_SECRET.to_string(),
            token_ttl_hours: 24,
        },
        services,
        WebhookSettings {
            secret_key: Some(WEBHOOK_SECRET.to_string()),
            bucket_name: Some(BUCKET.to_string()),
        },
        LONG_TEXT_THRESHOLD,
    );

    TestApp {
        router: lisan_api::build_router(state),
        pool,
        speech,
        media,
    }
}

pub fn token_for(user_id: i64, email: &str, role: Role, ttl: Duration) -> String {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (Utc::now() + ttl).timestamp(),
    };
    issue_token(&claims, TOKEN_SECRET).unwrap()
}

impl TestApp {
    /// Insert a user directly and return `(id, token)`
    pub async fn user_with_token(&self, email: &str, role: Role) -> (i64, String) {
        let user = lisan_api::db::users::create_user(
            &self.pool,
            email,
            "pengguna",
            &hash_password_with_cost("rahasia123", 4).unwrap(),
            role,
        )
        .await
        .unwrap();
        (user.id, token_for(user.id, email, role, Duration::hours(1)))
    }

    pub async fn admin_token(&self) -> String {
        self.user_with_token("admin@lisan.id", Role::Admin).await.1
    }

    pub async fn student_token(&self) -> String {
        self.user_with_token("siswa@lisan.id", Role::Student).await.1
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }
}
