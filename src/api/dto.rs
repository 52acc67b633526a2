//! API request and response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{ChapterRow, Series, Volume};
use crate::domain::{
    Chapter, ChapterContent, ChapterVersion, FRONT, LedgerEntry, ModerationAnalysis, Permission,
    PublicationState, Report, ReportStatus, RestrictionKind, RestrictionOrder, SeriesKind,
    TargetType, VersionDraft, VersionStatus,
};
use crate::service::{ChapterListing, LedgerPage, ReadableChapter, Resolution};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSeriesRequest {
    pub title: String,
    pub synopsis: Option<String>,
    pub kind: SeriesKind,
}

/// Absent fields are left unchanged; an empty synopsis clears it
#[derive(Debug, Deserialize)]
pub struct UpdateSeriesRequest {
    pub title: Option<String>,
    pub synopsis: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVolumeRequest {
    pub title: String,
}

/// Move an item after `after`; `0` or absent moves it to the front
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub after: Option<i64>,
}

impl ReorderRequest {
    pub fn after(&self) -> i64 {
        self.after.unwrap_or(FRONT)
    }
}

#[derive(Debug, Deserialize)]
pub struct VersionRequest {
    pub title: String,
    pub thumbnail: Option<String>,
    pub content: ChapterContent,
    pub note: Option<String>,
    #[serde(default)]
    pub is_auto_save: bool,
}

impl From<VersionRequest> for VersionDraft {
    fn from(request: VersionRequest) -> Self {
        VersionDraft {
            title: request.title,
            thumbnail: request.thumbnail,
            content: request.content,
            note: request.note,
            is_auto_save: request.is_auto_save,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateChapterRequest {
    #[serde(flatten)]
    pub version: VersionRequest,
    /// Price in the smallest currency unit; absent means free
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RenameVersionRequest {
    pub label: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    /// Future publish date; absent publishes immediately
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    pub content: String,
}

/// `target_id` is a number for series/content and a UUID string for
/// comments/reviews
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub target_type: TargetType,
    pub target_id: serde_json::Value,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub restriction_days: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
    pub status: Option<String>,
    pub target_type: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub synopsis: Option<String>,
    pub kind: String,
    pub volume_count: i64,
    pub row_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Series> for SeriesResponse {
    fn from(series: Series) -> Self {
        Self {
            id: series.id,
            owner_id: series.owner_id,
            title: series.title,
            synopsis: series.synopsis,
            kind: series.kind,
            volume_count: series.volume_count,
            row_version: series.row_version,
            created_at: series.created_at,
            updated_at: series.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub id: i64,
    pub series_id: i64,
    pub title: String,
    pub volume_number: i64,
    pub chapter_count: i64,
}

impl From<Volume> for VolumeResponse {
    fn from(volume: Volume) -> Self {
        Self {
            id: volume.id,
            series_id: volume.series_id,
            title: volume.title,
            volume_number: volume.volume_number,
            chapter_count: volume.chapter_count,
        }
    }
}

/// `(id, number)` after a reorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionResponse {
    pub id: i64,
    pub number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: String,
    pub title: String,
    pub label: String,
    pub status: VersionStatus,
    pub is_auto_save: bool,
    pub is_current: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl VersionSummary {
    fn of(chapter: &Chapter, version: &ChapterVersion) -> Self {
        Self {
            id: version.id.clone(),
            title: version.title.clone(),
            label: version.label.clone(),
            status: version.status,
            is_auto_save: version.is_auto_save,
            is_current: version.id == chapter.current_version_id,
            is_published: chapter.published_version_id.as_deref() == Some(version.id.as_str()),
            created_at: version.created_at,
        }
    }

    /// Version history of a chapter, newest first
    pub fn history(chapter: &Chapter) -> Vec<Self> {
        chapter
            .versions
            .iter()
            .rev()
            .map(|version| Self::of(chapter, version))
            .collect()
    }
}

/// Author's view of a chapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterResponse {
    pub id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub state: PublicationState,
    pub current_version_id: String,
    pub published_version_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub price: Option<i64>,
    pub row_version: i64,
    pub versions: Vec<VersionSummary>,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            state: chapter.publication_state(Utc::now()),
            versions: VersionSummary::history(&chapter),
            id: chapter.id,
            volume_id: chapter.volume_id,
            chapter_number: chapter.chapter_number,
            current_version_id: chapter.current_version_id,
            published_version_id: chapter.published_version_id,
            published_at: chapter.published_at,
            price: chapter.price,
            row_version: chapter.row_version,
        }
    }
}

/// Table-of-contents entry for readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterListingResponse {
    pub id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub state: PublicationState,
    pub published_at: Option<DateTime<Utc>>,
    pub price: Option<i64>,
}

impl From<ChapterListing> for ChapterListingResponse {
    fn from(listing: ChapterListing) -> Self {
        let ChapterRow {
            id,
            volume_id,
            chapter_number,
            published_at,
            price,
            ..
        } = listing.chapter;
        Self {
            id,
            volume_id,
            chapter_number,
            state: listing.state,
            published_at,
            price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadableChapterResponse {
    pub id: i64,
    pub volume_id: i64,
    pub chapter_number: i64,
    pub state: PublicationState,
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub content: ChapterContent,
    pub note: Option<String>,
    pub view_count: i64,
}

impl From<ReadableChapter> for ReadableChapterResponse {
    fn from(readable: ReadableChapter) -> Self {
        Self {
            id: readable.chapter.id,
            volume_id: readable.chapter.volume_id,
            chapter_number: readable.chapter.chapter_number,
            state: readable.state,
            published_at: readable.chapter.published_at,
            title: readable.version.title,
            thumbnail: readable.version.thumbnail,
            content: readable.version.content,
            note: readable.version.note,
            view_count: readable.view_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub id: String,
    pub target_type: TargetType,
    pub target_id: String,
    /// `None` for system reports
    pub reporter_id: Option<i64>,
    pub reason: String,
    pub status: ReportStatus,
    pub analysis: Option<ModerationAnalysis>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            target_type: report.target.target_type(),
            target_id: report.target.id_string(),
            reporter_id: report.reporter.user_id(),
            reason: report.reason,
            status: report.status,
            analysis: report.analysis,
            created_at: report.created_at,
            resolved_at: report.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub target_type: TargetType,
    pub target_id: String,
    pub report_count: usize,
    pub pending_count: usize,
    pub has_system_report: bool,
    pub latest_report_at: Option<DateTime<Utc>>,
    pub reports: Vec<ReportResponse>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            target_type: entry.target.target_type(),
            target_id: entry.target.id_string(),
            report_count: entry.reports.len(),
            pending_count: entry.pending_count(),
            has_system_report: entry.has_system_report(),
            latest_report_at: entry.latest_report_at(),
            reports: entry.reports.into_iter().map(ReportResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPageResponse {
    pub entries: Vec<LedgerEntryResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

impl From<LedgerPage> for LedgerPageResponse {
    fn from(page: LedgerPage) -> Self {
        Self {
            entries: page
                .entries
                .into_iter()
                .map(LedgerEntryResponse::from)
                .collect(),
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionResponse {
    pub user_id: i64,
    pub kind: RestrictionKind,
    pub until: DateTime<Utc>,
}

impl From<RestrictionOrder> for RestrictionResponse {
    fn from(order: RestrictionOrder) -> Self {
        Self {
            user_id: order.user_id,
            kind: order.kind,
            until: order.until,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction: Option<RestrictionResponse>,
}

impl From<Resolution> for TransitionResponse {
    fn from(resolution: Resolution) -> Self {
        Self {
            affected: resolution.affected,
            restriction: resolution.restriction.map(RestrictionResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestrictionsResponse {
    pub mute: Permission,
    pub publish: Permission,
}
