//! Reports and ledger entries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::restriction::{RestrictionKind, RestrictionOrder};
use crate::error::AppError;

pub const SYSTEM_REPORT_REASON: &str = "Flagged by automated content moderation";
pub const REASON_MAX_CHARS: usize = 1000;
pub const MIN_RESTRICTION_DAYS: i64 = 1;
pub const MAX_RESTRICTION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Series,
    Content,
    Comment,
    Review,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Content => "content",
            Self::Comment => "comment",
            Self::Review => "review",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "series" => Ok(Self::Series),
            "content" | "chapter" => Ok(Self::Content),
            "comment" => Ok(Self::Comment),
            "review" => Ok(Self::Review),
            other => Err(AppError::Validation(format!(
                "unknown report target type: {other}"
            ))),
        }
    }
}

/// What a report points at.
///
/// Series and chapters are keyed by integer ids, comments and reviews by
/// UUID. Once parsed, a target can never carry an id of the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportTarget {
    Series(i64),
    Content(i64),
    Comment(Uuid),
    Review(Uuid),
}

impl ReportTarget {
    pub fn target_type(&self) -> TargetType {
        match self {
            Self::Series(_) => TargetType::Series,
            Self::Content(_) => TargetType::Content,
            Self::Comment(_) => TargetType::Comment,
            Self::Review(_) => TargetType::Review,
        }
    }

    /// Storage form of the id (decimal integer or hyphenated UUID).
    pub fn id_string(&self) -> String {
        match self {
            Self::Series(id) | Self::Content(id) => id.to_string(),
            Self::Comment(id) | Self::Review(id) => id.to_string(),
        }
    }

    /// Parse the `(target_type, target_id)` pair used in URLs and storage.
    pub fn parse(target_type: TargetType, id: &str) -> Result<Self, AppError> {
        let mismatch = || {
            AppError::Validation(format!(
                "target id {id:?} does not match target type {}",
                target_type.as_str()
            ))
        };
        match target_type {
            TargetType::Series => id.parse().map(Self::Series).map_err(|_| mismatch()),
            TargetType::Content => id.parse().map(Self::Content).map_err(|_| mismatch()),
            TargetType::Comment => Uuid::parse_str(id).map(Self::Comment).map_err(|_| mismatch()),
            TargetType::Review => Uuid::parse_str(id).map(Self::Review).map_err(|_| mismatch()),
        }
    }

    /// Parse a JSON `target_id`, which may be a number or a string.
    pub fn from_json(target_type: TargetType, id: &serde_json::Value) -> Result<Self, AppError> {
        match (target_type, id) {
            (TargetType::Series, serde_json::Value::Number(n)) => n
                .as_i64()
                .map(Self::Series)
                .ok_or_else(|| AppError::Validation("series id must be an integer".to_string())),
            (TargetType::Content, serde_json::Value::Number(n)) => n
                .as_i64()
                .map(Self::Content)
                .ok_or_else(|| AppError::Validation("chapter id must be an integer".to_string())),
            (_, serde_json::Value::String(s)) => Self::parse(target_type, s),
            _ => Err(AppError::Validation(format!(
                "target id does not match target type {}",
                target_type.as_str()
            ))),
        }
    }

    /// Restriction applied to the owner when a report on this target is upheld.
    pub fn restriction_kind(&self) -> RestrictionKind {
        match self {
            Self::Comment(_) | Self::Review(_) => RestrictionKind::Mute,
            Self::Series(_) | Self::Content(_) => RestrictionKind::Publish,
        }
    }
}

impl std::fmt::Display for ReportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.target_type().as_str(), self.id_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    ActionTaken,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ActionTaken => "action_taken",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(Self::Pending),
            "action_taken" => Ok(Self::ActionTaken),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(AppError::Validation(format!("unknown report status: {other}"))),
        }
    }
}

/// Who filed a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reporter {
    System,
    User(i64),
}

impl Reporter {
    /// Nullable column form; `NULL` is the system sentinel.
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::System => None,
            Self::User(id) => Some(*id),
        }
    }

    pub fn from_user_id(id: Option<i64>) -> Self {
        id.map_or(Self::System, Self::User)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// Verdict of one content safety scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationAnalysis {
    pub flagged: bool,
    pub categories: Vec<CategoryScore>,
    pub analyzed_at: DateTime<Utc>,
}

impl ModerationAnalysis {
    pub fn unflagged(now: DateTime<Utc>) -> Self {
        Self {
            flagged: false,
            categories: Vec::new(),
            analyzed_at: now,
        }
    }

    /// Highest-scoring category, if any were reported.
    pub fn top_category(&self) -> Option<&CategoryScore> {
        self.categories
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// One reporter's report against one target
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: String,
    pub target: ReportTarget,
    pub reporter: Reporter,
    pub reason: String,
    pub status: ReportStatus,
    pub analysis: Option<ModerationAnalysis>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn system(target: ReportTarget, analysis: ModerationAnalysis, now: DateTime<Utc>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            target,
            reporter: Reporter::System,
            reason: SYSTEM_REPORT_REASON.to_string(),
            status: ReportStatus::Pending,
            analysis: Some(analysis),
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn user(
        reporter_id: i64,
        target: ReportTarget,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let reason = reason.trim();
        let len = reason.chars().count();
        if len == 0 || len > REASON_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "reason must be between 1 and {REASON_MAX_CHARS} characters"
            )));
        }
        Ok(Self {
            id: ulid::Ulid::new().to_string(),
            target,
            reporter: Reporter::User(reporter_id),
            reason: reason.to_string(),
            status: ReportStatus::Pending,
            analysis: None,
            created_at: now,
            resolved_at: None,
        })
    }
}

/// All reports sharing one target
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub target: ReportTarget,
    pub reports: Vec<Report>,
}

impl LedgerEntry {
    pub fn pending_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.status == ReportStatus::Pending)
            .count()
    }

    pub fn latest_report_at(&self) -> Option<DateTime<Utc>> {
        self.reports.iter().map(|report| report.created_at).max()
    }

    pub fn has_system_report(&self) -> bool {
        self.reports
            .iter()
            .any(|report| report.reporter == Reporter::System)
    }
}

/// Group reports into ledger entries, preserving first-seen target order.
pub fn group_by_target(reports: Vec<Report>) -> Vec<LedgerEntry> {
    let mut entries: Vec<LedgerEntry> = Vec::new();
    for report in reports {
        match entries.iter_mut().find(|entry| entry.target == report.target) {
            Some(entry) => entry.reports.push(report),
            None => entries.push(LedgerEntry {
                target: report.target,
                reports: vec![report],
            }),
        }
    }
    entries
}

/// Restriction expiry for an upheld entry: `now + days`.
pub fn restriction_until(days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    if !(MIN_RESTRICTION_DAYS..=MAX_RESTRICTION_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "restriction_days must be between {MIN_RESTRICTION_DAYS} and {MAX_RESTRICTION_DAYS}"
        )));
    }
    Ok(now + Duration::days(days))
}

/// Restriction order against the owner of an upheld target.
pub fn resolution(
    target: ReportTarget,
    owner_id: i64,
    days: i64,
    now: DateTime<Utc>,
) -> Result<RestrictionOrder, AppError> {
    Ok(RestrictionOrder {
        user_id: owner_id,
        kind: target.restriction_kind(),
        until: restriction_until(days, now)?,
    })
}
