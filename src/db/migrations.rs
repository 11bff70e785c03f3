//! Database migrations module
//!
//! All migrations are embedded directly in Rust code as SQL strings, with one
//! variant for SQLite and one for PostgreSQL.
//!
//! # Usage
//!
//! ```ignore
//! use mediapress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! # Architecture
//!
//! Each migration is defined as a `Migration` struct containing:
//! - `version`: Unique version number for ordering
//! - `name`: Human-readable migration name
//! - `up_sqlite`: SQL for SQLite database
//! - `up_postgres`: SQL for PostgreSQL database
//!
//! PostgreSQL gets the full search stack (weighted `tsvector`, trigram index,
//! `search_contents` function) and materialized statistics views. SQLite gets
//! plain views with the same names and columns so read queries are shared.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and PostgreSQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for PostgreSQL
    pub up_postgres: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, embedded in the binary.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(32) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                display_name VARCHAR(100),
                bio TEXT,
                avatar_url TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(32) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                display_name VARCHAR(100),
                bio TEXT,
                avatar_url TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
    },
    // Every user gets a settings row, seeded by trigger so no code path can miss it
    Migration {
        version: 2,
        name: "create_user_settings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                email_notifications BOOLEAN NOT NULL DEFAULT 1,
                profile_public BOOLEAN NOT NULL DEFAULT 1,
                theme VARCHAR(20) NOT NULL DEFAULT 'system',
                language VARCHAR(10) NOT NULL DEFAULT 'en',
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE TRIGGER IF NOT EXISTS trg_users_seed_settings
            AFTER INSERT ON users
            FOR EACH ROW
            BEGIN
                INSERT OR IGNORE INTO user_settings (user_id) VALUES (NEW.id);
            END;
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS user_settings (
                user_id BIGINT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email_notifications BOOLEAN NOT NULL DEFAULT TRUE,
                profile_public BOOLEAN NOT NULL DEFAULT TRUE,
                theme VARCHAR(20) NOT NULL DEFAULT 'system',
                language VARCHAR(10) NOT NULL DEFAULT 'en',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE OR REPLACE FUNCTION seed_user_settings() RETURNS trigger
            LANGUAGE plpgsql AS $$
            BEGIN
                INSERT INTO user_settings (user_id) VALUES (NEW.id)
                ON CONFLICT (user_id) DO NOTHING;
                RETURN NEW;
            END
            $$;
            DROP TRIGGER IF EXISTS trg_users_seed_settings ON users;
            CREATE TRIGGER trg_users_seed_settings
            AFTER INSERT ON users
            FOR EACH ROW EXECUTE FUNCTION seed_user_settings();
        "#,
    },
    Migration {
        version: 3,
        name: "create_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(120) NOT NULL UNIQUE,
                description TEXT,
                parent_id INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_categories_parent_id ON categories(parent_id);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL UNIQUE,
                slug VARCHAR(120) NOT NULL UNIQUE,
                description TEXT,
                parent_id BIGINT REFERENCES categories(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS idx_categories_parent_id ON categories(parent_id);
        "#,
    },
    // published_at may be written once; the guard trigger rejects any later change
    Migration {
        version: 4,
        name: "create_contents",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS contents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(220) NOT NULL UNIQUE,
                description TEXT,
                body TEXT,
                content_type VARCHAR(10) NOT NULL
                    CHECK (content_type IN ('article', 'video', 'image', 'audio')),
                media_url TEXT,
                duration_seconds INTEGER CHECK (duration_seconds IS NULL OR duration_seconds > 0),
                status VARCHAR(10) NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'pending', 'published', 'archived')),
                view_count INTEGER NOT NULL DEFAULT 0,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CHECK ((content_type = 'article' AND body IS NOT NULL)
                    OR (content_type <> 'article' AND media_url IS NOT NULL)),
                CHECK (status <> 'published' OR published_at IS NOT NULL),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE RESTRICT
            );
            CREATE INDEX IF NOT EXISTS idx_contents_author ON contents(author_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_contents_published
                ON contents(published_at DESC) WHERE status = 'published';
            CREATE INDEX IF NOT EXISTS idx_contents_category_published
                ON contents(category_id, published_at DESC) WHERE status = 'published';
            CREATE INDEX IF NOT EXISTS idx_contents_type_published
                ON contents(content_type, published_at DESC) WHERE status = 'published';
            CREATE TRIGGER IF NOT EXISTS trg_contents_keep_published_at
            BEFORE UPDATE OF published_at ON contents
            FOR EACH ROW
            WHEN OLD.published_at IS NOT NULL
                AND (NEW.published_at IS NULL OR NEW.published_at <> OLD.published_at)
            BEGIN
                SELECT RAISE(ABORT, 'published_at is immutable once set');
            END;
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS contents (
                id BIGSERIAL PRIMARY KEY,
                author_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                category_id BIGINT NOT NULL REFERENCES categories(id) ON DELETE RESTRICT,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(220) NOT NULL UNIQUE,
                description TEXT,
                body TEXT,
                content_type VARCHAR(10) NOT NULL
                    CHECK (content_type IN ('article', 'video', 'image', 'audio')),
                media_url TEXT,
                duration_seconds INTEGER CHECK (duration_seconds IS NULL OR duration_seconds > 0),
                status VARCHAR(10) NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'pending', 'published', 'archived')),
                view_count BIGINT NOT NULL DEFAULT 0,
                published_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CHECK ((content_type = 'article' AND body IS NOT NULL)
                    OR (content_type <> 'article' AND media_url IS NOT NULL)),
                CHECK (status <> 'published' OR published_at IS NOT NULL)
            );
            CREATE INDEX IF NOT EXISTS idx_contents_author ON contents(author_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_contents_published
                ON contents(published_at DESC) WHERE status = 'published';
            CREATE INDEX IF NOT EXISTS idx_contents_category_published
                ON contents(category_id, published_at DESC) WHERE status = 'published';
            CREATE INDEX IF NOT EXISTS idx_contents_type_published
                ON contents(content_type, published_at DESC) WHERE status = 'published';
            CREATE OR REPLACE FUNCTION contents_keep_published_at() RETURNS trigger
            LANGUAGE plpgsql AS $$
            BEGIN
                IF OLD.published_at IS NOT NULL
                    AND NEW.published_at IS DISTINCT FROM OLD.published_at THEN
                    RAISE EXCEPTION 'published_at is immutable once set';
                END IF;
                RETURN NEW;
            END
            $$;
            DROP TRIGGER IF EXISTS trg_contents_keep_published_at ON contents;
            CREATE TRIGGER trg_contents_keep_published_at
            BEFORE UPDATE ON contents
            FOR EACH ROW EXECUTE FUNCTION contents_keep_published_at();
        "#,
    },
    // Relevance search. The scoring lives in search_contents so the application
    // only forwards the query text and page bounds.
    Migration {
        version: 5,
        name: "create_content_search",
        up_sqlite: r#"
            CREATE INDEX IF NOT EXISTS idx_contents_title ON contents(title);
        "#,
        up_postgres: r#"
            CREATE EXTENSION IF NOT EXISTS pg_trgm;
            ALTER TABLE contents ADD COLUMN IF NOT EXISTS search_vector tsvector;
            CREATE OR REPLACE FUNCTION contents_search_vector_update() RETURNS trigger
            LANGUAGE plpgsql AS $$
            BEGIN
                NEW.search_vector :=
                    setweight(to_tsvector('english', coalesce(NEW.title, '')), 'A') ||
                    setweight(to_tsvector('english', coalesce(NEW.description, '')), 'B') ||
                    setweight(to_tsvector('english', coalesce(NEW.body, '')), 'C');
                RETURN NEW;
            END
            $$;
            DROP TRIGGER IF EXISTS trg_contents_search_vector ON contents;
            CREATE TRIGGER trg_contents_search_vector
            BEFORE INSERT OR UPDATE OF title, description, body ON contents
            FOR EACH ROW EXECUTE FUNCTION contents_search_vector_update();
            UPDATE contents SET search_vector =
                setweight(to_tsvector('english', coalesce(title, '')), 'A') ||
                setweight(to_tsvector('english', coalesce(description, '')), 'B') ||
                setweight(to_tsvector('english', coalesce(body, '')), 'C');
            CREATE INDEX IF NOT EXISTS idx_contents_search_vector ON contents USING GIN (search_vector);
            CREATE INDEX IF NOT EXISTS idx_contents_title_trgm ON contents USING GIN (title gin_trgm_ops);
            CREATE OR REPLACE FUNCTION search_contents(q TEXT, lim BIGINT, off BIGINT)
            RETURNS TABLE (content_id BIGINT, score DOUBLE PRECISION)
            LANGUAGE sql STABLE AS $$
                WITH params AS (
                    SELECT plainto_tsquery('english', q) AS tsq,
                           lower(q) AS lowered,
                           '%' || replace(replace(replace(q, '\', '\\'), '%', '\%'), '_', '\_') || '%' AS pattern
                )
                SELECT c.id,
                       (ts_rank(c.search_vector, p.tsq)
                        + CASE WHEN lower(c.title) = p.lowered THEN 1.0
                               WHEN c.title ILIKE p.pattern THEN 0.5
                               ELSE 0.0 END
                        + CASE WHEN c.view_count >= 10000 THEN 0.3
                               WHEN c.view_count >= 1000 THEN 0.2
                               WHEN c.view_count >= 100 THEN 0.1
                               ELSE 0.0 END
                        + CASE WHEN c.published_at >= now() - INTERVAL '7 days' THEN 0.3
                               WHEN c.published_at >= now() - INTERVAL '30 days' THEN 0.15
                               WHEN c.published_at >= now() - INTERVAL '365 days' THEN 0.05
                               ELSE 0.0 END)::float8 AS score
                FROM contents c, params p
                WHERE c.status = 'published'
                  AND (c.search_vector @@ p.tsq OR c.title ILIKE p.pattern OR c.title % q)
                ORDER BY score DESC, c.published_at DESC, c.id DESC
                LIMIT lim OFFSET off
            $$;
            CREATE OR REPLACE FUNCTION search_contents_count(q TEXT)
            RETURNS BIGINT
            LANGUAGE sql STABLE AS $$
                WITH params AS (
                    SELECT plainto_tsquery('english', q) AS tsq,
                           '%' || replace(replace(replace(q, '\', '\\'), '%', '\%'), '_', '\_') || '%' AS pattern
                )
                SELECT count(*)
                FROM contents c, params p
                WHERE c.status = 'published'
                  AND (c.search_vector @@ p.tsq OR c.title ILIKE p.pattern OR c.title % q)
            $$;
        "#,
    },
    Migration {
        version: 6,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                parent_id INTEGER,
                body TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (content_id) REFERENCES contents(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_content ON comments(content_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGSERIAL PRIMARY KEY,
                content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                parent_id BIGINT REFERENCES comments(id) ON DELETE CASCADE,
                body TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS idx_comments_content ON comments(content_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_ratings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                content_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, content_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (content_id) REFERENCES contents(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_ratings_content ON ratings(content_id);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS ratings (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (user_id, content_id)
            );
            CREATE INDEX IF NOT EXISTS idx_ratings_content ON ratings(content_id);
        "#,
    },
    // Self-follows are rejected by the CHECK constraint, not only by the service
    Migration {
        version: 8,
        name: "create_follows",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id INTEGER NOT NULL,
                following_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (follower_id, following_id),
                CHECK (follower_id <> following_id),
                FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (following_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                following_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (follower_id, following_id),
                CONSTRAINT follows_no_self_follow CHECK (follower_id <> following_id)
            );
            CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);
        "#,
    },
    Migration {
        version: 9,
        name: "create_bookmarks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                content_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, content_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (content_id) REFERENCES contents(id) ON DELETE CASCADE
            );
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content_id BIGINT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (user_id, content_id)
            );
        "#,
    },
    // Statistics read models. Materialized on PostgreSQL and refreshed
    // periodically; the unique indexes allow REFRESH ... CONCURRENTLY.
    Migration {
        version: 10,
        name: "create_stats_views",
        up_sqlite: r#"
            CREATE VIEW IF NOT EXISTS content_like_stats AS
                SELECT c.id AS content_id, COUNT(r.id) AS like_count
                FROM contents c
                LEFT JOIN ratings r ON r.content_id = c.id
                GROUP BY c.id;
            CREATE VIEW IF NOT EXISTS user_follow_stats AS
                SELECT u.id AS user_id,
                       (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS follower_count,
                       (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count
                FROM users u;
            CREATE VIEW IF NOT EXISTS following_feed AS
                SELECT f.follower_id, c.id AS content_id, c.author_id, c.published_at
                FROM follows f
                JOIN contents c ON c.author_id = f.following_id
                WHERE c.status = 'published';
        "#,
        up_postgres: r#"
            CREATE MATERIALIZED VIEW IF NOT EXISTS content_like_stats AS
                SELECT c.id AS content_id, COUNT(r.id) AS like_count
                FROM contents c
                LEFT JOIN ratings r ON r.content_id = c.id
                GROUP BY c.id;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_content_like_stats_content
                ON content_like_stats(content_id);
            CREATE MATERIALIZED VIEW IF NOT EXISTS user_follow_stats AS
                SELECT u.id AS user_id,
                       (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS follower_count,
                       (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count
                FROM users u;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_user_follow_stats_user
                ON user_follow_stats(user_id);
            CREATE MATERIALIZED VIEW IF NOT EXISTS following_feed AS
                SELECT f.follower_id, c.id AS content_id, c.author_id, c.published_at
                FROM follows f
                JOIN contents c ON c.author_id = f.following_id
                WHERE c.status = 'published';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_following_feed_pair
                ON following_feed(follower_id, content_id);
            CREATE INDEX IF NOT EXISTS idx_following_feed_recent
                ON following_feed(follower_id, published_at DESC);
        "#,
    },
];

/// Run all pending database migrations.
///
/// Each migration runs inside its own transaction together with its
/// `_migrations` bookkeeping row.
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Postgres => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    crate::with_pool!(pool, |conn| {
        sqlx::query_as::<_, MigrationRecord>(
            "SELECT version, name, applied_at FROM _migrations ORDER BY version",
        )
        .fetch_all(conn)
        .await
    })
    .context("Failed to read applied migrations")
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match (pool.as_sqlite(), pool.as_postgres()) {
        (Some(sqlite), _) => apply_migration_sqlite(sqlite, migration).await,
        (_, Some(postgres)) => apply_migration_postgres(postgres, migration).await,
        _ => anyhow::bail!("No database pool available"),
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn apply_migration_postgres(pool: &PgPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in split_sql_statements(migration.up_postgres) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements.
///
/// Semicolons only end a statement at nesting depth zero and outside of
/// string literals, `--` comments and dollar-quoted bodies. `BEGIN`/`CASE`
/// open a level and `END` closes one, which keeps SQLite trigger bodies whole.
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth: u32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            b'$' => {
                if let Some(tag_len) = dollar_tag_len(&bytes[i..]) {
                    let tag = &sql[i..i + tag_len];
                    let body_start = i + tag_len;
                    i = match sql[body_start..].find(tag) {
                        Some(end) => body_start + end + tag_len,
                        None => bytes.len(),
                    };
                    continue;
                }
            }
            b';' if depth == 0 => {
                let stmt = strip_leading_comments(&sql[start..i]);
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                start = i + 1;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let word_start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &sql[word_start..i];
                if word.eq_ignore_ascii_case("BEGIN") || word.eq_ignore_ascii_case("CASE") {
                    depth += 1;
                } else if word.eq_ignore_ascii_case("END") {
                    depth = depth.saturating_sub(1);
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    let stmt = strip_leading_comments(&sql[start.min(sql.len())..]);
    if !stmt.is_empty() {
        statements.push(stmt);
    }

    statements
}

/// Length of a dollar-quote opening tag (`$$` or `$name$`) at the start of `bytes`
fn dollar_tag_len(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'$') {
        return None;
    }
    if bytes.get(1).map_or(false, |b| b.is_ascii_digit()) {
        return None;
    }
    for (offset, b) in bytes.iter().enumerate().skip(1) {
        match b {
            b'$' => return Some(offset + 1),
            b if b.is_ascii_alphanumeric() || *b == b'_' => continue,
            _ => return None,
        }
    }
    None
}

/// Trim a statement and drop the `--` comment lines in front of it.
/// A comment-only chunk comes back empty.
fn strip_leading_comments(s: &str) -> &str {
    let mut rest = s.trim();
    while rest.starts_with("--") {
        rest = match rest.find('\n') {
            Some(newline) => rest[newline + 1..].trim_start(),
            None => "",
        };
    }
    rest
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}
