//! Vocabulary entries

use chrono::Utc;
use lisan_common::db::{Category, Vocabulary};
use lisan_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Vocabulary row with its category embedded
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyWithCategory {
    #[serde(flatten)]
    pub vocabulary: Vocabulary,
    pub category: Option<Category>,
}

#[derive(Debug, Clone)]
pub struct NewVocabulary {
    pub arabic_text: String,
    pub indonesian_text: String,
    pub category_id: i64,
    pub arabic_voice_path: Option<String>,
    pub indonesian_voice_path: Option<String>,
}

/// Partial update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct VocabularyChanges {
    pub arabic_text: Option<String>,
    pub indonesian_text: Option<String>,
    pub category_id: Option<i64>,
    pub arabic_voice_path: Option<String>,
    pub indonesian_voice_path: Option<String>,
}

async fn attach_categories(
    pool: &SqlitePool,
    vocabularies: Vec<Vocabulary>,
) -> Result<Vec<VocabularyWithCategory>> {
    let categories: HashMap<i64, Category> = crate::db::categories::list(pool)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(vocabularies
        .into_iter()
        .map(|vocabulary| VocabularyWithCategory {
            category: categories.get(&vocabulary.category_id).cloned(),
            vocabulary,
        })
        .collect())
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<VocabularyWithCategory>> {
    let vocabularies = sqlx::query_as::<_, Vocabulary>("SELECT * FROM vocabularies ORDER BY id")
        .fetch_all(pool)
        .await?;

    attach_categories(pool, vocabularies).await
}

pub async fn list_by_category(pool: &SqlitePool, category_id: i64) -> Result<Vec<Vocabulary>> {
    let vocabularies = sqlx::query_as::<_, Vocabulary>(
        "SELECT * FROM vocabularies WHERE category_id = ? ORDER BY id",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    Ok(vocabularies)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Vocabulary>> {
    let vocabulary = sqlx::query_as::<_, Vocabulary>("SELECT * FROM vocabularies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(vocabulary)
}

pub async fn get_with_category(pool: &SqlitePool, id: i64) -> Result<Option<VocabularyWithCategory>> {
    let Some(vocabulary) = get(pool, id).await? else {
        return Ok(None);
    };
    let category = crate::db::categories::get(pool, vocabulary.category_id).await?;

    Ok(Some(VocabularyWithCategory {
        vocabulary,
        category,
    }))
}

pub async fn create(pool: &SqlitePool, new: &NewVocabulary) -> Result<Vocabulary> {
    let now = Utc::now();
    let vocabulary = sqlx::query_as::<_, Vocabulary>(
        r#"
        INSERT INTO vocabularies
            (arabic_text, indonesian_text, category_id, arabic_voice_path, indonesian_voice_path,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new.arabic_text)
    .bind(&new.indonesian_text)
    .bind(new.category_id)
    .bind(&new.arabic_voice_path)
    .bind(&new.indonesian_voice_path)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(vocabulary)
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &VocabularyChanges,
) -> Result<Option<Vocabulary>> {
    let vocabulary = sqlx::query_as::<_, Vocabulary>(
        r#"
        UPDATE vocabularies
        SET arabic_text = COALESCE(?, arabic_text),
            indonesian_text = COALESCE(?, indonesian_text),
            category_id = COALESCE(?, category_id),
            arabic_voice_path = COALESCE(?, arabic_voice_path),
            indonesian_voice_path = COALESCE(?, indonesian_voice_path),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&changes.arabic_text)
    .bind(&changes.indonesian_text)
    .bind(changes.category_id)
    .bind(&changes.arabic_voice_path)
    .bind(&changes.indonesian_voice_path)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(vocabulary)
}

/// Delete an entry, returning the removed row so its audio can be cleaned up
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<Option<Vocabulary>> {
    let vocabulary =
        sqlx::query_as::<_, Vocabulary>("DELETE FROM vocabularies WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(vocabulary)
}
