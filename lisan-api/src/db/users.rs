//! User accounts

use chrono::Utc;
use lisan_common::config::AdminSeed;
use lisan_common::db::{Role, User};
use lisan_common::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password_hash: &str,
    role: Role,
) -> Result<User> {
    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, username, password, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Update username and/or avatar; `None` keeps the current value
pub async fn update_profile(
    pool: &SqlitePool,
    id: i64,
    username: Option<&str>,
    avatar: Option<&str>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET username = COALESCE(?, username),
            avatar = COALESCE(?, avatar),
            updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(avatar)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Delete an account; progress rows cascade. Returns false if absent.
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Create the configured admin account unless the email is already taken
///
/// Returns true when a new account was created.
pub async fn ensure_admin(pool: &SqlitePool, seed: &AdminSeed) -> Result<bool> {
    if find_by_email(pool, &seed.email).await?.is_some() {
        info!(email = %seed.email, "Admin account already exists");
        return Ok(false);
    }

    let hash = lisan_common::auth::hash_password(&seed.password)?;
    create_user(pool, &seed.email, &seed.username, &hash, Role::Admin).await?;
    info!(email = %seed.email, "Created admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lisan_common::db::init_memory_database;

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "a@b.co", "alice", "hash", Role::Student)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Student);

        let found = find_by_email(&pool, "a@b.co").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_by_id(&pool, user.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = init_memory_database().await.unwrap();
        create_user(&pool, "a@b.co", "alice", "h", Role::Student).await.unwrap();
        let err = create_user(&pool, "a@b.co", "bob", "h", Role::Student)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_unset_fields() {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(&pool, "a@b.co", "alice", "h", Role::Student).await.unwrap();

        let updated = update_profile(&pool, user.id, None, Some("https://img.test/a.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.avatar.as_deref(), Some("https://img.test/a.png"));

        assert!(update_profile(&pool, 999, Some("x"), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let seed = AdminSeed {
            email: "admin@example.com".into(),
            password: "password123".into(),
            username: "Admin".into(),
        };

        assert!(ensure_admin(&pool, &seed).await.unwrap());
        assert!(!ensure_admin(&pool, &seed).await.unwrap());

        let admin = find_by_email(&pool, "admin@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(lisan_common::auth::verify_password("password123", &admin.password));
    }
}
