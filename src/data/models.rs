//! Data models
//!
//! Rust structs representing database rows.
//! Aggregates are rebuilt from these by the store functions; timestamps are
//! chrono `DateTime<Utc>` stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChapterContent, ChapterVersion, ModerationAnalysis, Report, ReportStatus, ReportTarget,
    Reporter, TargetType, UserRestrictions, VersionStatus,
};
use crate::error::AppError;

// =============================================================================
// User
// =============================================================================

/// A platform user (author, reader, or moderator)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_moderator: bool,
    /// Comment/review writes blocked until this time
    pub mute_until: Option<DateTime<Utc>>,
    /// Chapter publishing blocked until this time
    pub restrict_publish_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn restrictions(&self) -> UserRestrictions {
        UserRestrictions {
            mute_until: self.mute_until,
            restrict_publish_until: self.restrict_publish_until,
        }
    }
}

/// Advance-chapter access for one series
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entitlement {
    pub user_id: i64,
    pub series_id: i64,
    /// `None` means no expiry
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Series {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub synopsis: Option<String>,
    /// "novel" or "comic"
    pub kind: String,
    pub volume_count: i64,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Volume {
    pub id: i64,
    pub series_id: i64,
    pub title: String,
    pub volume_number: i64,
    /// Authoritative dense counter of chapters in this volume
    pub chapter_count: i64,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
}

/// Chapter head row (versions live in `chapter_versions`)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChapterRow {
    pub id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub current_version_id: String,
    pub published_version_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub price: Option<i64>,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChapterVersionRow {
    pub id: String,
    pub chapter_id: i64,
    pub position: i64,
    pub title: String,
    pub thumbnail: Option<String>,
    /// `ChapterContent` as JSON
    pub content: String,
    pub note: Option<String>,
    pub label: String,
    pub is_auto_save: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ChapterVersionRow> for ChapterVersion {
    type Error = AppError;

    fn try_from(row: ChapterVersionRow) -> Result<Self, Self::Error> {
        let content: ChapterContent = serde_json::from_str(&row.content).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "corrupt content for version {}: {e}",
                row.id
            ))
        })?;
        Ok(ChapterVersion {
            status: VersionStatus::parse(&row.status)?,
            id: row.id,
            title: row.title,
            thumbnail: row.thumbnail,
            content,
            note: row.note,
            label: row.label,
            is_auto_save: row.is_auto_save,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Community
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    /// UUID v4
    pub id: String,
    pub chapter_id: i64,
    pub author_id: i64,
    /// Escaped text
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    /// UUID v4
    pub id: String,
    pub series_id: i64,
    pub author_id: i64,
    /// 1..=5
    pub rating: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Moderation
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    /// ULID
    pub id: String,
    pub target_type: String,
    pub target_id: String,
    /// NULL for system reports
    pub reporter_id: Option<i64>,
    pub reason: String,
    pub status: String,
    /// `ModerationAnalysis` as JSON
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReportRow> for Report {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let target = ReportTarget::parse(TargetType::parse(&row.target_type)?, &row.target_id)?;
        let analysis = row
            .analysis
            .as_deref()
            .map(serde_json::from_str::<ModerationAnalysis>)
            .transpose()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("corrupt analysis for report {}: {e}", row.id))
            })?;
        Ok(Report {
            id: row.id,
            target,
            reporter: Reporter::from_user_id(row.reporter_id),
            reason: row.reason,
            status: ReportStatus::parse(&row.status)?,
            analysis,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn entitlement_expiry() {
        let now = Utc::now();
        let open = Entitlement {
            user_id: 1,
            series_id: 1,
            expires_at: None,
        };
        let expired = Entitlement {
            expires_at: Some(now - Duration::days(1)),
            ..open.clone()
        };
        assert!(open.is_active(now));
        assert!(!expired.is_active(now));
    }

    #[test]
    fn report_row_with_mismatched_id_is_rejected() {
        let row = ReportRow {
            id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            target_type: "comment".to_string(),
            target_id: "12".to_string(),
            reporter_id: None,
            reason: "x".to_string(),
            status: "pending".to_string(),
            analysis: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        assert!(matches!(Report::try_from(row), Err(AppError::Validation(_))));
    }
}
