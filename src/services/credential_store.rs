//! CredentialStore: user records in the `users` table.
//!
//! Users are only created by startup seeding. There are deliberately no update
//! or delete operations.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::user::{Role, User},
    services::password::hash_password,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct CredentialStore {
    pub db: Arc<SqlitePool>,
}

impl CredentialStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert an administrator unless `username` is already taken.
    ///
    /// Returns `true` when a row was written. The password is always stored as
    /// a salted Argon2 hash.
    pub async fn seed_administrator(
        &self,
        username: &str,
        raw_password: &str,
    ) -> GalleryResult<bool> {
        self.seed_user(username, raw_password, Role::Admin).await
    }

    /// Insert a user with `role` unless `username` is already taken.
    ///
    /// Uniqueness is enforced by the `UNIQUE` constraint, so concurrent or
    /// repeated startups cannot produce a second row.
    pub async fn seed_user(
        &self,
        username: &str,
        raw_password: &str,
        role: Role,
    ) -> GalleryResult<bool> {
        if username.trim().is_empty() {
            return Err(GalleryError::validation("username is required"));
        }
        if raw_password.is_empty() {
            return Err(GalleryError::validation("password is required"));
        }

        let hash = hash_password(raw_password)?;
        let result =
            sqlx::query("INSERT OR IGNORE INTO users (username, password, role) VALUES (?, ?, ?)")
                .bind(username)
                .bind(&hash)
                .bind(role)
                .execute(&*self.db)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Exact-match lookup by username.
    pub async fn find_by_username(&self, username: &str) -> GalleryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }
}
