use axum::async_trait;

use crate::db::{postgres::PgSession, StoreError};
use crate::users::repo_types::{NewUser, User};

/// User queries available on every session.
#[async_trait]
pub trait UserStore: Send {
    /// Find a user by email.
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError>;

    /// One page of users, ordered by id.
    async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError>;

    /// Persist a new user and commit. A taken email yields
    /// [`StoreError::Duplicate`].
    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
impl UserStore for PgSession {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let tx = self.tx().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, hashed_password, is_active
            FROM users
            WHERE email = $1
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let tx = self.tx().await?;
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, hashed_password, is_active FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(user)
    }

    async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<User>, StoreError> {
        let tx = self.tx().await?;
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, hashed_password, is_active
            FROM users
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    async fn insert(&mut self, user: NewUser) -> Result<User, StoreError> {
        let tx = self.tx().await?;
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, hashed_password, is_active)
            VALUES ($1, $2, $3)
            RETURNING id, email, hashed_password, is_active
            "#,
        )
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.is_active)
        .fetch_one(&mut **tx)
        .await?;
        self.commit().await?;
        Ok(row)
    }
}
