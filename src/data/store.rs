//! Transaction-scoped loads and saves
//!
//! Every function here runs on a connection borrowed from an open
//! transaction (`&mut *tx`). Aggregate saves check `row_version`; a
//! mismatch means another command committed first and surfaces as
//! `AppError::Conflict`.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::models::*;
use crate::domain::ordering::{Sequence, Slot};
use crate::domain::{
    Chapter, ChapterVersion, Report, ReportStatus, ReportTarget, UserRestrictions, VersionStatus,
};
use crate::error::AppError;

fn stale(what: &str) -> AppError {
    AppError::Conflict(format!("{what} was modified concurrently, retry"))
}

// =============================================================================
// Users and restrictions
// =============================================================================

pub async fn get_user(conn: &mut SqliteConnection, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_restrictions(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<UserRestrictions, AppError> {
    Ok(get_user(conn, user_id).await?.restrictions())
}

/// Persist both restriction timestamps of a user
pub async fn update_restrictions(
    conn: &mut SqliteConnection,
    user_id: i64,
    restrictions: &UserRestrictions,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE users SET mute_until = ?, restrict_publish_until = ? WHERE id = ?",
    )
    .bind(restrictions.mute_until)
    .bind(restrictions.restrict_publish_until)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

// =============================================================================
// Series and volumes
// =============================================================================

pub async fn get_series(conn: &mut SqliteConnection, series_id: i64) -> Result<Series, AppError> {
    sqlx::query_as::<_, Series>("SELECT * FROM series WHERE id = ?")
        .bind(series_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn insert_series(
    conn: &mut SqliteConnection,
    owner_id: i64,
    title: &str,
    synopsis: Option<&str>,
    kind: &str,
    now: DateTime<Utc>,
) -> Result<Series, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO series (owner_id, title, synopsis, kind, volume_count, row_version, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(title)
    .bind(synopsis)
    .bind(kind)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    get_series(conn, id).await
}

/// Save title/synopsis/volume_count guarded by `row_version`.
///
/// Returns the new row version.
pub async fn update_series(conn: &mut SqliteConnection, series: &Series) -> Result<i64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE series
        SET title = ?, synopsis = ?, volume_count = ?, updated_at = ?, row_version = row_version + 1
        WHERE id = ? AND row_version = ?
        "#,
    )
    .bind(&series.title)
    .bind(&series.synopsis)
    .bind(series.volume_count)
    .bind(series.updated_at)
    .bind(series.id)
    .bind(series.row_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale("series"));
    }
    Ok(series.row_version + 1)
}

pub async fn get_volume(conn: &mut SqliteConnection, volume_id: i64) -> Result<Volume, AppError> {
    sqlx::query_as::<_, Volume>("SELECT * FROM volumes WHERE id = ?")
        .bind(volume_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn insert_volume(
    conn: &mut SqliteConnection,
    series_id: i64,
    title: &str,
    volume_number: i64,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO volumes (series_id, title, volume_number, chapter_count, row_version, created_at)
        VALUES (?, ?, ?, 0, 0, ?)
        RETURNING id
        "#,
    )
    .bind(series_id)
    .bind(title)
    .bind(volume_number)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Save the chapter counter guarded by `row_version`
pub async fn update_volume_counter(
    conn: &mut SqliteConnection,
    volume: &Volume,
    chapter_count: i64,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE volumes SET chapter_count = ?, row_version = row_version + 1
        WHERE id = ? AND row_version = ?
        "#,
    )
    .bind(chapter_count)
    .bind(volume.id)
    .bind(volume.row_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale("volume"));
    }
    Ok(())
}

pub async fn delete_volume(conn: &mut SqliteConnection, volume_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM volumes WHERE id = ?")
        .bind(volume_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Sibling numbering
// =============================================================================

pub async fn get_volume_sequence(
    conn: &mut SqliteConnection,
    series_id: i64,
) -> Result<Sequence, AppError> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT id, volume_number FROM volumes WHERE series_id = ?",
    )
    .bind(series_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Sequence::new(
        rows.into_iter()
            .map(|(id, number)| Slot { id, number })
            .collect(),
    ))
}

pub async fn get_chapter_sequence(
    conn: &mut SqliteConnection,
    volume_id: i64,
) -> Result<Sequence, AppError> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT id, chapter_number FROM chapters WHERE volume_id = ?",
    )
    .bind(volume_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Sequence::new(
        rows.into_iter()
            .map(|(id, number)| Slot { id, number })
            .collect(),
    ))
}

pub async fn update_volume_numbers(
    conn: &mut SqliteConnection,
    slots: &[Slot],
) -> Result<(), AppError> {
    for slot in slots {
        sqlx::query("UPDATE volumes SET volume_number = ? WHERE id = ?")
            .bind(slot.number)
            .bind(slot.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn update_chapter_numbers(
    conn: &mut SqliteConnection,
    slots: &[Slot],
) -> Result<(), AppError> {
    for slot in slots {
        sqlx::query("UPDATE chapters SET chapter_number = ? WHERE id = ?")
            .bind(slot.number)
            .bind(slot.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

// =============================================================================
// Chapters and versions
// =============================================================================

/// Load a chapter with its full version history
pub async fn get_chapter(conn: &mut SqliteConnection, chapter_id: i64) -> Result<Chapter, AppError> {
    let row = sqlx::query_as::<_, ChapterRow>("SELECT * FROM chapters WHERE id = ?")
        .bind(chapter_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let versions = sqlx::query_as::<_, ChapterVersionRow>(
        "SELECT * FROM chapter_versions WHERE chapter_id = ? ORDER BY position",
    )
    .bind(chapter_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(ChapterVersion::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Chapter {
        id: row.id,
        volume_id: row.volume_id,
        chapter_number: row.chapter_number,
        versions,
        current_version_id: row.current_version_id,
        published_version_id: row.published_version_id,
        published_at: row.published_at,
        price: row.price,
        row_version: row.row_version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Insert a new chapter head and all of its versions. Returns the chapter id.
pub async fn insert_chapter(conn: &mut SqliteConnection, chapter: &Chapter) -> Result<i64, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO chapters (
            volume_id, chapter_number, current_version_id, published_version_id,
            published_at, price, row_version, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(chapter.volume_id)
    .bind(chapter.chapter_number)
    .bind(&chapter.current_version_id)
    .bind(&chapter.published_version_id)
    .bind(chapter.published_at)
    .bind(chapter.price)
    .bind(chapter.created_at)
    .bind(chapter.updated_at)
    .fetch_one(&mut *conn)
    .await?;

    for version in &chapter.versions {
        insert_version(conn, id, version).await?;
    }

    Ok(id)
}

/// Append a version after the chapter's existing ones
pub async fn insert_version(
    conn: &mut SqliteConnection,
    chapter_id: i64,
    version: &ChapterVersion,
) -> Result<(), AppError> {
    let content = serde_json::to_string(&version.content)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode content: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO chapter_versions (
            id, chapter_id, position, title, thumbnail, content, note, label,
            is_auto_save, status, created_at
        ) VALUES (
            ?, ?,
            (SELECT COALESCE(MAX(position), 0) + 1 FROM chapter_versions WHERE chapter_id = ?),
            ?, ?, ?, ?, ?, ?, ?, ?
        )
        "#,
    )
    .bind(&version.id)
    .bind(chapter_id)
    .bind(chapter_id)
    .bind(&version.title)
    .bind(&version.thumbnail)
    .bind(content)
    .bind(&version.note)
    .bind(&version.label)
    .bind(version.is_auto_save)
    .bind(version.status.as_str())
    .bind(version.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Save the chapter head (pointers, publish date) guarded by `row_version`.
///
/// Returns the new row version.
pub async fn update_chapter(conn: &mut SqliteConnection, chapter: &Chapter) -> Result<i64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE chapters
        SET current_version_id = ?, published_version_id = ?, published_at = ?,
            price = ?, updated_at = ?, row_version = row_version + 1
        WHERE id = ? AND row_version = ?
        "#,
    )
    .bind(&chapter.current_version_id)
    .bind(&chapter.published_version_id)
    .bind(chapter.published_at)
    .bind(chapter.price)
    .bind(chapter.updated_at)
    .bind(chapter.id)
    .bind(chapter.row_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(stale("chapter"));
    }
    Ok(chapter.row_version + 1)
}

pub async fn update_version_label(
    conn: &mut SqliteConnection,
    version_id: &str,
    label: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE chapter_versions SET label = ? WHERE id = ?")
        .bind(label)
        .bind(version_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_version_status(
    conn: &mut SqliteConnection,
    version_id: &str,
    status: VersionStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE chapter_versions SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(version_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_version(conn: &mut SqliteConnection, version_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM chapter_versions WHERE id = ?")
        .bind(version_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_chapter(conn: &mut SqliteConnection, chapter_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM chapters WHERE id = ?")
        .bind(chapter_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Series (and its owner) that a volume belongs to
pub async fn get_series_for_volume(
    conn: &mut SqliteConnection,
    volume_id: i64,
) -> Result<Series, AppError> {
    sqlx::query_as::<_, Series>(
        "SELECT s.* FROM series s JOIN volumes v ON v.series_id = s.id WHERE v.id = ?",
    )
    .bind(volume_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound)
}

// =============================================================================
// Community
// =============================================================================

pub async fn insert_comment(conn: &mut SqliteConnection, comment: &Comment) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO comments (id, chapter_id, author_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&comment.id)
    .bind(comment.chapter_id)
    .bind(comment.author_id)
    .bind(&comment.content)
    .bind(comment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_review(conn: &mut SqliteConnection, review: &Review) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO reviews (id, series_id, author_id, rating, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&review.id)
    .bind(review.series_id)
    .bind(review.author_id)
    .bind(review.rating)
    .bind(&review.content)
    .bind(review.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Reports
// =============================================================================

pub async fn insert_report(conn: &mut SqliteConnection, report: &Report) -> Result<(), AppError> {
    let analysis = report
        .analysis
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode analysis: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO reports (
            id, target_type, target_id, reporter_id, reason, status, analysis,
            created_at, resolved_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&report.id)
    .bind(report.target.target_type().as_str())
    .bind(report.target.id_string())
    .bind(report.reporter.user_id())
    .bind(&report.reason)
    .bind(report.status.as_str())
    .bind(analysis)
    .bind(report.created_at)
    .bind(report.resolved_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Move every report of one ledger key to `status`.
///
/// Returns the number of rows; zero means the key has no reports.
pub async fn update_report_status(
    conn: &mut SqliteConnection,
    target: &ReportTarget,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE reports SET status = ?, resolved_at = ?
        WHERE target_type = ? AND target_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(now)
    .bind(target.target_type().as_str())
    .bind(target.id_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Owner of a reportable target, or `None` if the target does not exist.
///
/// Series and chapters are owned by the series owner; comments and reviews
/// by their author.
pub async fn get_target_owner(
    conn: &mut SqliteConnection,
    target: &ReportTarget,
) -> Result<Option<i64>, AppError> {
    let owner = match target {
        ReportTarget::Series(id) => {
            sqlx::query_scalar::<_, i64>("SELECT owner_id FROM series WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
        }
        ReportTarget::Content(id) => {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT s.owner_id FROM chapters c
                JOIN volumes v ON v.id = c.volume_id
                JOIN series s ON s.id = v.series_id
                WHERE c.id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        }
        ReportTarget::Comment(id) => {
            sqlx::query_scalar::<_, i64>("SELECT author_id FROM comments WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?
        }
        ReportTarget::Review(id) => {
            sqlx::query_scalar::<_, i64>("SELECT author_id FROM reviews WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?
        }
    };

    Ok(owner)
}
