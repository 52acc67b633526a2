//! SQLite database operations
//!
//! Pool-level reads and single-statement writes live here. Commands that
//! must be atomic open a transaction with [`Database::begin`] and use the
//! functions in [`super::store`].

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::time::Duration;

use super::models::*;
use crate::config::DatabaseConfig;
use crate::domain::{Report, ReportStatus, ReportTarget, TargetType};
use crate::error::AppError;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with(path, DEFAULT_MAX_CONNECTIONS, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Connect using the `[database]` configuration section.
    pub async fn connect_with_config(config: &DatabaseConfig) -> Result<Self, AppError> {
        Self::connect_with(
            &config.path,
            config.max_connections,
            Duration::from_millis(config.busy_timeout_ms),
        )
        .await
    }

    async fn connect_with(
        path: &Path,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user row.
    ///
    /// Account registration is handled elsewhere; this is the hook it (and
    /// the test suites) use.
    pub async fn create_user(&self, username: &str, is_moderator: bool) -> Result<User, AppError> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, is_moderator, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(username)
        .bind(is_moderator)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id,
            username: username.to_string(),
            is_moderator,
            mute_until: None,
            restrict_publish_until: None,
            created_at: now,
        })
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    // =========================================================================
    // Entitlements
    // =========================================================================

    /// Grant (or extend) advance-chapter access to a series
    pub async fn grant_entitlement(
        &self,
        user_id: i64,
        series_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (user_id, series_id, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(user_id, series_id) DO UPDATE SET expires_at = excluded.expires_at
            "#,
        )
        .bind(user_id)
        .bind(series_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_entitlement(
        &self,
        user_id: i64,
        series_id: i64,
    ) -> Result<Option<Entitlement>, AppError> {
        let entitlement = sqlx::query_as::<_, Entitlement>(
            "SELECT * FROM entitlements WHERE user_id = ? AND series_id = ?",
        )
        .bind(user_id)
        .bind(series_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entitlement)
    }

    // =========================================================================
    // Catalog reads
    // =========================================================================

    pub async fn get_series(&self, id: i64) -> Result<Option<Series>, AppError> {
        let series = sqlx::query_as::<_, Series>("SELECT * FROM series WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(series)
    }

    pub async fn get_volume(&self, id: i64) -> Result<Option<Volume>, AppError> {
        let volume = sqlx::query_as::<_, Volume>("SELECT * FROM volumes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(volume)
    }

    /// Volumes of a series in reading order
    pub async fn list_volumes(&self, series_id: i64) -> Result<Vec<Volume>, AppError> {
        let volumes = sqlx::query_as::<_, Volume>(
            "SELECT * FROM volumes WHERE series_id = ? ORDER BY volume_number",
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(volumes)
    }

    pub async fn get_chapter(&self, id: i64) -> Result<Option<ChapterRow>, AppError> {
        let chapter = sqlx::query_as::<_, ChapterRow>("SELECT * FROM chapters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chapter)
    }

    /// Chapter heads of a volume in reading order
    pub async fn list_chapters(&self, volume_id: i64) -> Result<Vec<ChapterRow>, AppError> {
        let chapters = sqlx::query_as::<_, ChapterRow>(
            "SELECT * FROM chapters WHERE volume_id = ? ORDER BY chapter_number",
        )
        .bind(volume_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chapters)
    }

    pub async fn get_chapter_version(
        &self,
        id: &str,
    ) -> Result<Option<ChapterVersionRow>, AppError> {
        let version =
            sqlx::query_as::<_, ChapterVersionRow>("SELECT * FROM chapter_versions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(version)
    }

    /// Series a chapter belongs to
    pub async fn get_series_for_chapter(&self, chapter_id: i64) -> Result<Option<Series>, AppError> {
        let series = sqlx::query_as::<_, Series>(
            r#"
            SELECT s.* FROM series s
            JOIN volumes v ON v.series_id = s.id
            JOIN chapters c ON c.volume_id = v.id
            WHERE c.id = ?
            "#,
        )
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(series)
    }

    // =========================================================================
    // Reading analytics
    // =========================================================================

    /// Count one read of a chapter on `day`
    pub async fn record_view(&self, chapter_id: i64, day: NaiveDate) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO reading_analytics (chapter_id, day, views) VALUES (?, ?, 1)
            ON CONFLICT(chapter_id, day) DO UPDATE SET views = views + 1
            "#,
        )
        .bind(chapter_id)
        .bind(day)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Total reads across all days
    pub async fn get_view_count(&self, chapter_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(views), 0) FROM reading_analytics WHERE chapter_id = ?",
        )
        .bind(chapter_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // =========================================================================
    // Community reads
    // =========================================================================

    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    pub async fn list_comments(&self, chapter_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE chapter_id = ? ORDER BY created_at",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    pub async fn get_review(&self, id: &str) -> Result<Option<Review>, AppError> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(review)
    }

    // =========================================================================
    // Report ledger reads
    // =========================================================================

    /// Reports of one page of ledger keys
    ///
    /// Keys are ordered by their latest report, newest first; reports within
    /// a key oldest first. Rows of one key are contiguous.
    ///
    /// # Arguments
    /// * `status` - keep keys having at least one report in this status
    /// * `target_type` - keep keys of this target type
    pub async fn list_ledger_reports(
        &self,
        status: Option<ReportStatus>,
        target_type: Option<TargetType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            WITH page AS (
                SELECT target_type, target_id, MAX(created_at) AS latest_report_at
                FROM reports
                WHERE (?1 IS NULL OR target_type = ?1)
                GROUP BY target_type, target_id
                HAVING (?2 IS NULL OR SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END) > 0)
                ORDER BY latest_report_at DESC, target_type, target_id
                LIMIT ?3 OFFSET ?4
            )
            SELECT r.*
            FROM reports r
            JOIN page p ON p.target_type = r.target_type AND p.target_id = r.target_id
            ORDER BY p.latest_report_at DESC, p.target_type, p.target_id, r.created_at, r.id
            "#,
        )
        .bind(target_type.map(|t| t.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Report::try_from).collect()
    }

    pub async fn count_ledger_keys(
        &self,
        status: Option<ReportStatus>,
        target_type: Option<TargetType>,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT 1 FROM reports
                WHERE (?1 IS NULL OR target_type = ?1)
                GROUP BY target_type, target_id
                HAVING (?2 IS NULL OR SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END) > 0)
            )
            "#,
        )
        .bind(target_type.map(|t| t.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// All reports for one ledger key, oldest first
    pub async fn get_reports_for_target(
        &self,
        target: &ReportTarget,
    ) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            "SELECT * FROM reports WHERE target_type = ? AND target_id = ? ORDER BY created_at, id",
        )
        .bind(target.target_type().as_str())
        .bind(target.id_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Report::try_from).collect()
    }
}
