//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services own transaction boundaries; domain rules live in `crate::domain`.

mod catalog;
mod community;
mod moderation;
mod pipeline;
mod publishing;
mod reader;
pub(crate) mod restriction;
mod safety;

pub use catalog::CatalogService;
pub use community::CommunityService;
pub use moderation::{LedgerPage, LedgerQuery, ModerationService, Resolution};
pub use pipeline::{EventDispatcher, ModerationPipeline};
pub use publishing::PublishingService;
pub use reader::{ChapterListing, ReadableChapter, ReaderService};
pub use restriction::RestrictionService;
pub use safety::{
    ContentClassifier, ContentSafetyGate, DisabledClassifier, HttpClassifier,
    classifier_from_config,
};
