//! Restriction service
//!
//! Applies and checks mute / publish restrictions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::data::{Database, store};
use crate::domain::{GuardedAction, Permission, RestrictionKind, RestrictionOrder};
use crate::error::AppError;
use crate::metrics::{RESTRICTED_ATTEMPTS_TOTAL, RESTRICTIONS_APPLIED_TOTAL};

/// Reject `action` if `user_id` is currently restricted from it.
///
/// Runs on the caller's transaction so the check and the guarded write
/// see the same snapshot.
pub(crate) async fn guard(
    conn: &mut SqliteConnection,
    user_id: i64,
    action: GuardedAction,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let restrictions = store::get_restrictions(conn, user_id).await?;
    if let Err(error) = restrictions.ensure_allowed(action, now) {
        let kind = action.restriction_kind();
        RESTRICTED_ATTEMPTS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        tracing::info!(user_id, kind = kind.as_str(), "Rejected action of restricted user");
        return Err(error);
    }
    Ok(())
}

/// Apply a restriction order on the caller's transaction
pub(crate) async fn apply(
    conn: &mut SqliteConnection,
    order: &RestrictionOrder,
) -> Result<(), AppError> {
    let mut restrictions = store::get_restrictions(conn, order.user_id).await?;
    restrictions.set(order.kind, order.until);
    store::update_restrictions(conn, order.user_id, &restrictions).await?;
    RESTRICTIONS_APPLIED_TOTAL
        .with_label_values(&[order.kind.as_str()])
        .inc();
    tracing::info!(
        user_id = order.user_id,
        kind = order.kind.as_str(),
        until = %order.until,
        "Restriction applied"
    );
    Ok(())
}

/// Restriction service
pub struct RestrictionService {
    db: Arc<Database>,
}

impl RestrictionService {
    /// Create new restriction service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Block comments and reviews until `until`
    pub async fn mute(&self, user_id: i64, until: DateTime<Utc>) -> Result<(), AppError> {
        self.restrict(RestrictionOrder {
            user_id,
            kind: RestrictionKind::Mute,
            until,
        })
        .await
    }

    /// Block chapter publishing until `until`
    pub async fn restrict_publish(&self, user_id: i64, until: DateTime<Utc>) -> Result<(), AppError> {
        self.restrict(RestrictionOrder {
            user_id,
            kind: RestrictionKind::Publish,
            until,
        })
        .await
    }

    /// Overwrites any existing restriction of the same kind, even a longer one.
    pub async fn restrict(&self, order: RestrictionOrder) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        apply(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Clear a restriction before it expires
    pub async fn lift(&self, user_id: i64, kind: RestrictionKind) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;
        let mut restrictions = store::get_restrictions(&mut tx, user_id).await?;
        restrictions.clear(kind);
        store::update_restrictions(&mut tx, user_id, &restrictions).await?;
        tx.commit().await?;

        tracing::info!(user_id, kind = kind.as_str(), "Restriction lifted");
        Ok(())
    }

    pub async fn is_allowed(&self, user_id: i64, kind: RestrictionKind) -> Result<Permission, AppError> {
        let user = self.db.get_user(user_id).await?.ok_or(AppError::NotFound)?;
        Ok(user.restrictions().permission(kind, Utc::now()))
    }

    pub async fn ensure_allowed(&self, user_id: i64, action: GuardedAction) -> Result<(), AppError> {
        let mut conn = self.db.pool().acquire().await?;
        guard(&mut conn, user_id, action, Utc::now()).await
    }

    /// Both restriction states of one user
    pub async fn permissions(&self, user_id: i64) -> Result<(Permission, Permission), AppError> {
        let user = self.db.get_user(user_id).await?.ok_or(AppError::NotFound)?;
        let restrictions = user.restrictions();
        let now = Utc::now();
        Ok((
            restrictions.permission(RestrictionKind::Mute, now),
            restrictions.permission(RestrictionKind::Publish, now),
        ))
    }
}
