//! User repository
//!
//! Database operations for users and their settings row.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `UserSettingsRepository` trait for the per-user settings row
//! - `SqlxUserRepository` implementing both for SQLite and PostgreSQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole, UserSettings};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, display_name, bio, avatar_url, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Create a self-registered account. The first account in an empty table
    /// is stored as admin whatever `user.role` says; the check and the insert
    /// cannot interleave with another registration.
    async fn create_account(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update profile fields, email and password hash
    async fn update(&self, user: &User) -> Result<User>;

    /// Change a user's role
    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>>;

    /// Delete a user. Returns false when no row matched.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users, newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
}

/// Settings repository trait
#[async_trait]
pub trait UserSettingsRepository: Send + Sync {
    /// Get the settings row of a user
    async fn get(&self, user_id: i64) -> Result<Option<UserSettings>>;

    /// Overwrite the settings row of a user
    async fn update(&self, settings: &UserSettings) -> Result<Option<UserSettings>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and PostgreSQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    /// Create a boxed settings repository sharing the same pool
    pub fn boxed_settings(pool: DynDatabasePool) -> Arc<dyn UserSettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, display_name, bio, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.to_string())
                .bind(&user.display_name)
                .bind(&user.bio)
                .bind(&user.avatar_url)
                .bind(now)
                .fetch_one(conn)
                .await
        })
        .context("Failed to create user")
    }

    async fn create_account(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, display_name, bio, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, CASE WHEN EXISTS (SELECT 1 FROM users) THEN $4 ELSE 'admin' END, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        match self.pool.driver() {
            // SQLite runs one writer at a time, so the single statement is enough
            DatabaseDriver::Sqlite => {
                let pool = self.pool.as_sqlite().context("SQLite pool unavailable")?;
                sqlx::query_as::<_, User>(&sql)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.to_string())
                    .bind(&user.display_name)
                    .bind(&user.bio)
                    .bind(&user.avatar_url)
                    .bind(now)
                    .fetch_one(pool)
                    .await
                    .context("Failed to create user")
            }
            DatabaseDriver::Postgres => {
                let pool = self.pool.as_postgres().context("PostgreSQL pool unavailable")?;
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                // Self-conflicting lock: concurrent registrations queue here
                sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
                    .execute(&mut *tx)
                    .await
                    .context("Failed to lock users table")?;
                let created = sqlx::query_as::<_, User>(&sql)
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.to_string())
                    .bind(&user.display_name)
                    .bind(&user.bio)
                    .bind(&user.avatar_url)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to create user")?;
                tx.commit().await.context("Failed to commit user")?;
                Ok(created)
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(conn).await
        })
        .context("Failed to get user by ID")
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql).bind(username).fetch_optional(conn).await
        })
        .context("Failed to get user by username")
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let email = email.to_lowercase();
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql).bind(&email).fetch_optional(conn).await
        })
        .context("Failed to get user by email")
    }

    async fn update(&self, user: &User) -> Result<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = $1, password_hash = $2, display_name = $3, bio = $4, avatar_url = $5, updated_at = $6
            WHERE id = $7
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.display_name)
                .bind(&user.bio)
                .bind(&user.avatar_url)
                .bind(Utc::now())
                .bind(user.id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to update user")?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET role = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
            USER_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(role.to_string())
                .bind(Utc::now())
                .bind(id)
                .fetch_optional(conn)
                .await
        })
        .context("Failed to set user role")
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = with_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id)
                .execute(conn)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete user")?;

        Ok(result > 0)
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |conn| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(conn)
                .await
        })
        .context("Failed to count users")
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, User>(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(conn)
                .await
        })
        .context("Failed to list users")
    }
}

#[async_trait]
impl UserSettingsRepository for SqlxUserRepository {
    async fn get(&self, user_id: i64) -> Result<Option<UserSettings>> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, UserSettings>(
                r#"
                SELECT user_id, email_notifications, profile_public, theme, language, updated_at
                FROM user_settings
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(conn)
            .await
        })
        .context("Failed to get user settings")
    }

    async fn update(&self, settings: &UserSettings) -> Result<Option<UserSettings>> {
        with_pool!(self.pool, |conn| {
            sqlx::query_as::<_, UserSettings>(
                r#"
                UPDATE user_settings
                SET email_notifications = $1, profile_public = $2, theme = $3, language = $4, updated_at = $5
                WHERE user_id = $6
                RETURNING user_id, email_notifications, profile_public, theme, language, updated_at
                "#,
            )
            .bind(settings.email_notifications)
            .bind(settings.profile_public)
            .bind(&settings.theme)
            .bind(&settings.language)
            .bind(Utc::now())
            .bind(settings.user_id)
            .fetch_optional(conn)
            .await
        })
        .context("Failed to update user settings")
    }
}
