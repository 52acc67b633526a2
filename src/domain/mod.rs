//! Domain model
//!
//! Pure aggregates and rules with no I/O. The data layer loads and stores
//! them; the service layer runs them inside transactions.

pub mod catalog;
pub mod chapter;
pub mod events;
pub mod moderation;
pub mod ordering;
pub mod restriction;

pub use catalog::SeriesKind;
pub use chapter::{
    Chapter, ChapterContent, ChapterVersion, PublicationState, PublishChange, VersionDraft,
    VersionStatus,
};
pub use events::{DomainEvent, Outcome, ScanInput};
pub use moderation::{
    CategoryScore, LedgerEntry, ModerationAnalysis, Report, ReportStatus, ReportTarget, Reporter,
    TargetType,
};
pub use ordering::{FRONT, Sequence, Slot};
pub use restriction::{GuardedAction, Permission, RestrictionKind, RestrictionOrder, UserRestrictions};
