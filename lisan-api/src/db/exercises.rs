//! Exercises and their answer choices

use chrono::Utc;
use lisan_common::db::{AnswerChoice, Exercise};
use lisan_common::Result;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::info;
use utoipa::ToSchema;

pub const DEFAULT_EXERCISE_TYPE: &str = "MULTIPLE_CHOICE";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExerciseWithChoices {
    #[serde(flatten)]
    pub exercise: Exercise,
    pub choices: Vec<AnswerChoice>,
}

#[derive(Debug, Clone)]
pub struct NewChoice {
    pub text: String,
    pub voice_path: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub question: String,
    pub exercise_type: String,
    pub voice_path: Option<String>,
    /// `None` creates a final-exam question
    pub level_id: Option<i64>,
    pub choices: Vec<NewChoice>,
}

/// Partial update
///
/// `level_id: Some(None)` moves the exercise to the final exam. A non-empty
/// `choices` replaces every existing choice.
#[derive(Debug, Clone, Default)]
pub struct ExerciseChanges {
    pub question: Option<String>,
    pub exercise_type: Option<String>,
    pub voice_path: Option<String>,
    pub level_id: Option<Option<i64>>,
    pub choices: Option<Vec<NewChoice>>,
}

async fn insert_choices(
    conn: &mut SqliteConnection,
    exercise_id: i64,
    choices: &[NewChoice],
) -> Result<()> {
    for choice in choices {
        sqlx::query(
            "INSERT INTO answer_choices (text, voice_path, is_correct, exercise_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&choice.text)
        .bind(&choice.voice_path)
        .bind(choice.is_correct)
        .bind(exercise_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Choices for a set of exercises, grouped by exercise id in insertion order
async fn choices_for(pool: &SqlitePool, exercise_ids: &[i64]) -> Result<HashMap<i64, Vec<AnswerChoice>>> {
    let mut grouped: HashMap<i64, Vec<AnswerChoice>> = HashMap::new();
    if exercise_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; exercise_ids.len()].join(", ");
    let sql = format!(
        "SELECT * FROM answer_choices WHERE exercise_id IN ({}) ORDER BY id ASC",
        placeholders
    );
    let mut query = sqlx::query_as::<_, AnswerChoice>(&sql);
    for id in exercise_ids {
        query = query.bind(id);
    }

    for choice in query.fetch_all(pool).await? {
        grouped.entry(choice.exercise_id).or_default().push(choice);
    }
    Ok(grouped)
}

async fn with_choices(pool: &SqlitePool, exercises: Vec<Exercise>) -> Result<Vec<ExerciseWithChoices>> {
    let ids: Vec<i64> = exercises.iter().map(|e| e.id).collect();
    let mut choices = choices_for(pool, &ids).await?;

    Ok(exercises
        .into_iter()
        .map(|exercise| ExerciseWithChoices {
            choices: choices.remove(&exercise.id).unwrap_or_default(),
            exercise,
        })
        .collect())
}

/// Final-exam questions (no level)
pub async fn list_final(pool: &SqlitePool) -> Result<Vec<ExerciseWithChoices>> {
    let exercises = sqlx::query_as::<_, Exercise>(
        "SELECT * FROM exercises WHERE level_id IS NULL ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    with_choices(pool, exercises).await
}

pub async fn list_by_level_with_choices(
    pool: &SqlitePool,
    level_id: i64,
) -> Result<Vec<ExerciseWithChoices>> {
    let exercises = sqlx::query_as::<_, Exercise>(
        "SELECT * FROM exercises WHERE level_id = ? ORDER BY id ASC",
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    with_choices(pool, exercises).await
}

pub async fn get_with_choices(pool: &SqlitePool, id: i64) -> Result<Option<ExerciseWithChoices>> {
    let exercise = sqlx::query_as::<_, Exercise>("SELECT * FROM exercises WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match exercise {
        Some(exercise) => Ok(with_choices(pool, vec![exercise]).await?.pop()),
        None => Ok(None),
    }
}

/// Insert an exercise and its choices in one transaction
pub async fn create(pool: &SqlitePool, new: &NewExercise) -> Result<ExerciseWithChoices> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    let exercise = sqlx::query_as::<_, Exercise>(
        r#"
        INSERT INTO exercises (question, type, voice_path, level_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new.question)
    .bind(&new.exercise_type)
    .bind(&new.voice_path)
    .bind(new.level_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    insert_choices(&mut tx, exercise.id, &new.choices).await?;
    tx.commit().await?;

    info!(
        exercise_id = exercise.id,
        level_id = ?exercise.level_id,
        choices = new.choices.len(),
        "Created exercise"
    );

    get_with_choices(pool, exercise.id)
        .await?
        .ok_or_else(|| lisan_common::Error::Internal("Created exercise vanished".into()))
}

/// Apply `changes` in one transaction; `None` if the exercise is missing
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &ExerciseChanges,
) -> Result<Option<ExerciseWithChoices>> {
    let mut tx = pool.begin().await?;

    let replace_level = changes.level_id.is_some();
    let level_id = changes.level_id.flatten();

    let updated = sqlx::query(
        r#"
        UPDATE exercises
        SET question = COALESCE(?, question),
            type = COALESCE(?, type),
            voice_path = COALESCE(?, voice_path),
            level_id = CASE WHEN ? THEN ? ELSE level_id END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&changes.question)
    .bind(&changes.exercise_type)
    .bind(&changes.voice_path)
    .bind(replace_level)
    .bind(level_id)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    if let Some(choices) = changes.choices.as_ref().filter(|c| !c.is_empty()) {
        sqlx::query("DELETE FROM answer_choices WHERE exercise_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_choices(&mut tx, id, choices).await?;
    }

    tx.commit().await?;
    get_with_choices(pool, id).await
}

/// Delete an exercise; choices cascade. Returns false if absent.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM exercises WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Correct-choice id set for every exercise of a level
///
/// Exercises without any correct choice map to an empty set.
pub async fn correct_sets_for_level(
    pool: &SqlitePool,
    level_id: i64,
) -> Result<HashMap<i64, HashSet<i64>>> {
    let rows: Vec<(i64, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT e.id, c.id
        FROM exercises e
        LEFT JOIN answer_choices c ON c.exercise_id = e.id AND c.is_correct = 1
        WHERE e.level_id = ?
        "#,
    )
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    let mut sets: HashMap<i64, HashSet<i64>> = HashMap::new();
    for (exercise_id, choice_id) in rows {
        let set = sets.entry(exercise_id).or_default();
        if let Some(choice_id) = choice_id {
            set.insert(choice_id);
        }
    }
    Ok(sets)
}
