//! Database models
//!
//! Rows map 1:1 onto tables created in `init.rs`. JSON field names are
//! camelCase to match the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    /// Salted password hash, never serialized
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dictionary category
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub id: i64,
    pub arabic_text: String,
    pub indonesian_text: String,
    pub category_id: i64,
    pub arabic_voice_path: Option<String>,
    pub indonesian_voice_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lesson narration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum AudioStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub voice_path: Option<String>,
    pub audio_status: AudioStatus,
    pub audio_operation_id: Option<String>,
    pub sequence: i64,
    pub level_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An exercise question. `level_id == None` marks a final-exam question.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: i64,
    pub question: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub exercise_type: String,
    pub voice_path: Option<String>,
    pub level_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exercise {
    pub fn is_final_exam(&self) -> bool {
        self.level_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerChoice {
    pub id: i64,
    pub text: String,
    pub voice_path: Option<String>,
    pub is_correct: bool,
    pub exercise_id: i64,
}

/// Per-user progress state for a level or lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProgressStatus {
    Locked,
    Unlocked,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLevelProgress {
    pub user_id: i64,
    pub level_id: i64,
    pub status: ProgressStatus,
    pub score: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserLessonProgress {
    pub user_id: i64,
    pub lesson_id: i64,
    pub status: ProgressStatus,
    pub score: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}
