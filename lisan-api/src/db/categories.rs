//! Dictionary categories

use chrono::Utc;
use lisan_common::db::Category;
use lisan_common::Result;
use sqlx::SqlitePool;

/// All categories, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<Category>> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await?;

    Ok(categories)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(category)
}

pub async fn create(pool: &SqlitePool, name: &str) -> Result<Category> {
    let now = Utc::now();
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, created_at, updated_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(category)
}

pub async fn rename(pool: &SqlitePool, id: i64, name: &str) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(name)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(category)
}

/// Delete a category. Fails with a foreign-key violation while it still
/// owns vocabulary.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisan_common::db::init_memory_database;

    #[tokio::test]
    async fn test_crud() {
        let pool = init_memory_database().await.unwrap();
        let noun = create(&pool, "Kata Benda").await.unwrap();
        let verb = create(&pool, "Kata Kerja").await.unwrap();

        let all = list(&pool).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, verb.id);

        let renamed = rename(&pool, noun.id, "Nomina").await.unwrap().unwrap();
        assert_eq!(renamed.name, "Nomina");
        assert!(rename(&pool, 999, "x").await.unwrap().is_none());

        assert!(delete(&pool, noun.id).await.unwrap());
        assert!(!delete(&pool, noun.id).await.unwrap());
        assert!(get(&pool, noun.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_vocabulary_is_restricted() {
        let pool = init_memory_database().await.unwrap();
        let category = create(&pool, "Kata Benda").await.unwrap();
        crate::db::vocabularies::create(
            &pool,
            &crate::db::vocabularies::NewVocabulary {
                arabic_text: "كتاب".into(),
                indonesian_text: "buku".into(),
                category_id: category.id,
                arabic_voice_path: None,
                indonesian_voice_path: None,
            },
        )
        .await
        .unwrap();

        let err = delete(&pool, category.id).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
    }
}
