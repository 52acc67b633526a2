//! Moderation service
//!
//! The report ledger: system and user reports grouped by target, and the
//! moderator transitions that close a ledger entry.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, store};
use crate::domain::moderation::{group_by_target, resolution, restriction_until};
use crate::domain::{
    DomainEvent, LedgerEntry, ModerationAnalysis, Outcome, Report, ReportStatus, ReportTarget,
    RestrictionOrder, TargetType,
};
use crate::error::AppError;
use crate::metrics::{REPORT_TRANSITIONS_TOTAL, REPORTS_FILED_TOTAL};
use crate::service::restriction;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Ledger listing filter
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// Entries having at least one report in this status
    pub status: Option<ReportStatus>,
    pub target_type: Option<TargetType>,
    /// 1-based
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl LedgerQuery {
    fn page_and_limit(&self) -> Result<(u32, u32), AppError> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page == 0 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok((page, limit))
    }
}

#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

/// Result of upholding a ledger entry
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub affected: u64,
    /// `None` when the reported target no longer exists
    pub restriction: Option<RestrictionOrder>,
}

/// Moderation service
pub struct ModerationService {
    db: Arc<Database>,
}

impl ModerationService {
    /// Create new moderation service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// File a report for a flagged scan verdict.
    ///
    /// Every flagged scan gets its own row; repeated flags on the same target
    /// all land in the one ledger entry.
    pub async fn file_system_report(
        &self,
        target: ReportTarget,
        analysis: ModerationAnalysis,
    ) -> Result<Report, AppError> {
        let report = Report::system(target, analysis, Utc::now());

        let mut tx = self.db.begin().await?;
        store::insert_report(&mut tx, &report).await?;
        tx.commit().await?;

        REPORTS_FILED_TOTAL
            .with_label_values(&["system", target.target_type().as_str()])
            .inc();
        tracing::info!(report_id = %report.id, report_target = %target, "System report filed");

        Ok(report)
    }

    /// File a user report against an existing target
    pub async fn file_user_report(
        &self,
        reporter_id: i64,
        target: ReportTarget,
        reason: &str,
    ) -> Result<Report, AppError> {
        let report = Report::user(reporter_id, target, reason, Utc::now())?;

        let mut tx = self.db.begin().await?;
        if store::get_target_owner(&mut tx, &target).await?.is_none() {
            return Err(AppError::NotFound);
        }
        store::insert_report(&mut tx, &report).await?;
        tx.commit().await?;

        REPORTS_FILED_TOTAL
            .with_label_values(&["user", target.target_type().as_str()])
            .inc();
        tracing::info!(
            report_id = %report.id,
            report_target = %target,
            reporter_id,
            "User report filed"
        );

        Ok(report)
    }

    /// Mark every report of the entry Dismissed
    pub async fn dismiss(&self, target: ReportTarget) -> Result<Outcome<u64>, AppError> {
        let mut tx = self.db.begin().await?;
        let affected =
            store::update_report_status(&mut tx, &target, ReportStatus::Dismissed, Utc::now())
                .await?;
        if affected == 0 {
            return Err(AppError::NotFound);
        }
        tx.commit().await?;

        REPORT_TRANSITIONS_TOTAL
            .with_label_values(&[ReportStatus::Dismissed.as_str()])
            .inc();
        tracing::info!(report_target = %target, affected, "Ledger entry dismissed");

        Ok(Outcome::new(affected).with_event(DomainEvent::ReportsTransitioned { target, affected }))
    }

    /// Mark every report of the entry ActionTaken and restrict the target's
    /// owner for `restriction_days`, all in one transaction.
    pub async fn resolve(
        &self,
        target: ReportTarget,
        restriction_days: i64,
    ) -> Result<Outcome<Resolution>, AppError> {
        let now = Utc::now();
        restriction_until(restriction_days, now)?;
        let mut tx = self.db.begin().await?;

        let owner = store::get_target_owner(&mut tx, &target).await?;
        let order = owner
            .map(|owner_id| resolution(target, owner_id, restriction_days, now))
            .transpose()?;

        let affected =
            store::update_report_status(&mut tx, &target, ReportStatus::ActionTaken, now).await?;
        if affected == 0 {
            return Err(AppError::NotFound);
        }
        match &order {
            Some(order) => restriction::apply(&mut tx, order).await?,
            None => tracing::warn!(report_target = %target, "Reported target is gone; no owner to restrict"),
        }

        tx.commit().await?;

        REPORT_TRANSITIONS_TOTAL
            .with_label_values(&[ReportStatus::ActionTaken.as_str()])
            .inc();
        tracing::info!(report_target = %target, affected, "Ledger entry resolved");

        let mut outcome = Outcome::new(Resolution {
            affected,
            restriction: order,
        })
        .with_event(DomainEvent::ReportsTransitioned { target, affected });
        if let Some(order) = order {
            outcome = outcome.with_event(DomainEvent::UserRestricted(order));
        }
        Ok(outcome)
    }

    /// Ledger entries, newest activity first
    pub async fn list_entries(&self, query: &LedgerQuery) -> Result<LedgerPage, AppError> {
        let (page, limit) = query.page_and_limit()?;
        let offset = i64::from(page - 1) * i64::from(limit);

        let reports = self
            .db
            .list_ledger_reports(query.status, query.target_type, i64::from(limit), offset)
            .await?;
        let total = self
            .db
            .count_ledger_keys(query.status, query.target_type)
            .await?;
        let entries = group_by_target(reports);

        Ok(LedgerPage {
            entries,
            page,
            limit,
            total,
        })
    }

    /// All reports of one entry
    pub async fn entry(&self, target: ReportTarget) -> Result<LedgerEntry, AppError> {
        let reports = self.db.get_reports_for_target(&target).await?;
        if reports.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(LedgerEntry { target, reports })
    }
}
