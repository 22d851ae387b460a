//! Per-user level and lesson progress rows

use chrono::Utc;
use lisan_common::db::{ProgressStatus, UserLessonProgress, UserLevelProgress};
use lisan_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Stored level status by level id
pub async fn level_statuses_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<HashMap<i64, ProgressStatus>> {
    let rows: Vec<(i64, ProgressStatus)> =
        sqlx::query_as("SELECT level_id, status FROM user_level_progress WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().collect())
}

/// Stored lesson status by lesson id, restricted to one level
pub async fn lesson_statuses_for_user(
    pool: &SqlitePool,
    user_id: i64,
    level_id: i64,
) -> Result<HashMap<i64, ProgressStatus>> {
    let rows: Vec<(i64, ProgressStatus)> = sqlx::query_as(
        r#"
        SELECT p.lesson_id, p.status
        FROM user_lesson_progress p
        JOIN lessons l ON l.id = p.lesson_id
        WHERE p.user_id = ? AND l.level_id = ?
        "#,
    )
    .bind(user_id)
    .bind(level_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Mark a level completed with `score`; a later submission overwrites
pub async fn upsert_level_completion(
    pool: &SqlitePool,
    user_id: i64,
    level_id: i64,
    score: i64,
) -> Result<UserLevelProgress> {
    let progress = sqlx::query_as::<_, UserLevelProgress>(
        r#"
        INSERT INTO user_level_progress (user_id, level_id, status, score, completed_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, level_id) DO UPDATE SET
            status = excluded.status,
            score = excluded.score,
            completed_at = excluded.completed_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(level_id)
    .bind(ProgressStatus::Completed)
    .bind(score)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

pub async fn upsert_lesson_completion(
    pool: &SqlitePool,
    user_id: i64,
    lesson_id: i64,
) -> Result<UserLessonProgress> {
    let progress = sqlx::query_as::<_, UserLessonProgress>(
        r#"
        INSERT INTO user_lesson_progress (user_id, lesson_id, status, completed_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id, lesson_id) DO UPDATE SET
            status = excluded.status,
            completed_at = excluded.completed_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .bind(ProgressStatus::Completed)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::lessons::{self, LessonAudio, NewLesson};
    use crate::db::levels::{self, NewLevel};
    use crate::db::users;
    use lisan_common::db::{init_memory_database, Role};

    async fn fixture(pool: &SqlitePool) -> (i64, i64) {
        let user = users::create_user(pool, "s@x.id", "siswa", "hash", Role::Student)
            .await
            .unwrap();
        let level = levels::create(
            pool,
            &NewLevel {
                name: "Pemula".into(),
                description: None,
                sequence: 1,
            },
        )
        .await
        .unwrap();
        (user.id, level.id)
    }

    #[tokio::test]
    async fn test_level_upsert_last_write_wins() {
        let pool = init_memory_database().await.unwrap();
        let (user_id, level_id) = fixture(&pool).await;

        upsert_level_completion(&pool, user_id, level_id, 40).await.unwrap();
        let progress = upsert_level_completion(&pool, user_id, level_id, 90).await.unwrap();
        assert_eq!(progress.score, Some(90));
        assert_eq!(progress.status, ProgressStatus::Completed);
        assert!(progress.completed_at.is_some());

        let statuses = level_statuses_for_user(&pool, user_id).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&level_id], ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn test_lesson_statuses_scoped_to_level() {
        let pool = init_memory_database().await.unwrap();
        let (user_id, level_id) = fixture(&pool).await;
        let other_level = levels::create(
            &pool,
            &NewLevel {
                name: "Menengah".into(),
                description: None,
                sequence: 2,
            },
        )
        .await
        .unwrap()
        .id;

        let mut lesson_ids = Vec::new();
        for level in [level_id, other_level] {
            let lesson = lessons::create(
                &pool,
                &NewLesson {
                    title: "Pelajaran".into(),
                    content: "نص".into(),
                    sequence: 1,
                    level_id: level,
                    audio: LessonAudio::ready(None),
                },
            )
            .await
            .unwrap();
            upsert_lesson_completion(&pool, user_id, lesson.id).await.unwrap();
            lesson_ids.push(lesson.id);
        }

        let statuses = lesson_statuses_for_user(&pool, user_id, level_id).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&lesson_ids[0]], ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn test_progress_cascades_with_user() {
        let pool = init_memory_database().await.unwrap();
        let (user_id, level_id) = fixture(&pool).await;
        upsert_level_completion(&pool, user_id, level_id, 100).await.unwrap();

        users::delete_user(&pool, user_id).await.unwrap();
        assert!(level_statuses_for_user(&pool, user_id).await.unwrap().is_empty());
    }
}
