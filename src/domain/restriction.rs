//! User restrictions (mute, publish restriction)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    /// Blocks writing comments and reviews
    Mute,
    /// Blocks publishing chapters
    Publish,
}

impl RestrictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mute => "mute",
            Self::Publish => "publish",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "mute" => Ok(Self::Mute),
            "publish" | "restrict_publish" => Ok(Self::Publish),
            other => Err(AppError::Validation(format!(
                "unknown restriction kind: {other}"
            ))),
        }
    }
}

/// Actions that consult a restriction before running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Comment,
    Review,
    PublishChapter,
}

impl GuardedAction {
    pub fn restriction_kind(&self) -> RestrictionKind {
        match self {
            Self::Comment | Self::Review => RestrictionKind::Mute,
            Self::PublishChapter => RestrictionKind::Publish,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permission {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

/// Restriction timestamps held on a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRestrictions {
    pub mute_until: Option<DateTime<Utc>>,
    pub restrict_publish_until: Option<DateTime<Utc>>,
}

impl UserRestrictions {
    pub fn until(&self, kind: RestrictionKind) -> Option<DateTime<Utc>> {
        match kind {
            RestrictionKind::Mute => self.mute_until,
            RestrictionKind::Publish => self.restrict_publish_until,
        }
    }

    /// Last writer wins: a shorter restriction replaces a longer one.
    pub fn set(&mut self, kind: RestrictionKind, until: DateTime<Utc>) {
        match kind {
            RestrictionKind::Mute => self.mute_until = Some(until),
            RestrictionKind::Publish => self.restrict_publish_until = Some(until),
        }
    }

    pub fn clear(&mut self, kind: RestrictionKind) {
        match kind {
            RestrictionKind::Mute => self.mute_until = None,
            RestrictionKind::Publish => self.restrict_publish_until = None,
        }
    }

    /// A restriction is active while `now < until`.
    pub fn permission(&self, kind: RestrictionKind, now: DateTime<Utc>) -> Permission {
        match self.until(kind) {
            Some(until) if now < until => Permission {
                allowed: false,
                until: Some(until),
            },
            _ => Permission {
                allowed: true,
                until: None,
            },
        }
    }

    pub fn ensure_allowed(&self, action: GuardedAction, now: DateTime<Utc>) -> Result<(), AppError> {
        let permission = self.permission(action.restriction_kind(), now);
        match permission.until {
            Some(until) if !permission.allowed => Err(AppError::Restricted { until }),
            _ => Ok(()),
        }
    }
}

/// A restriction to apply to one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionOrder {
    pub user_id: i64,
    pub kind: RestrictionKind,
    pub until: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn no_restriction_allows_everything() {
        let restrictions = UserRestrictions::default();
        let now = Utc::now();
        assert!(restrictions.permission(RestrictionKind::Mute, now).allowed);
        assert!(
            restrictions
                .ensure_allowed(GuardedAction::PublishChapter, now)
                .is_ok()
        );
    }

    #[test]
    fn active_mute_blocks_comment_and_review_only() {
        let now = Utc::now();
        let until = now + Duration::days(3);
        let mut restrictions = UserRestrictions::default();
        restrictions.set(RestrictionKind::Mute, until);

        for action in [GuardedAction::Comment, GuardedAction::Review] {
            match restrictions.ensure_allowed(action, now) {
                Err(AppError::Restricted { until: got }) => assert_eq!(got, until),
                other => panic!("expected Restricted, got {other:?}"),
            }
        }
        assert!(
            restrictions
                .ensure_allowed(GuardedAction::PublishChapter, now)
                .is_ok()
        );
    }

    #[test]
    fn restriction_expires() {
        let now = Utc::now();
        let until = now + Duration::days(7);
        let mut restrictions = UserRestrictions::default();
        restrictions.set(RestrictionKind::Publish, until);

        assert!(!restrictions.permission(RestrictionKind::Publish, now).allowed);
        assert!(
            !restrictions
                .permission(RestrictionKind::Publish, until - Duration::seconds(1))
                .allowed
        );
        assert!(restrictions.permission(RestrictionKind::Publish, until).allowed);
    }

    #[test]
    fn later_write_overwrites_longer_restriction() {
        let now = Utc::now();
        let mut restrictions = UserRestrictions::default();
        restrictions.set(RestrictionKind::Mute, now + Duration::days(30));
        restrictions.set(RestrictionKind::Mute, now + Duration::days(1));
        assert_eq!(restrictions.mute_until, Some(now + Duration::days(1)));

        restrictions.clear(RestrictionKind::Mute);
        assert!(restrictions.permission(RestrictionKind::Mute, now).allowed);
    }

    #[test]
    fn kind_parse_accepts_aliases() {
        assert_eq!(RestrictionKind::parse("mute").unwrap(), RestrictionKind::Mute);
        assert_eq!(
            RestrictionKind::parse("restrict_publish").unwrap(),
            RestrictionKind::Publish
        );
        assert!(RestrictionKind::parse("ban").is_err());
    }
}
