//! Domain events returned by commands
//!
//! Commands never call the content classifier themselves. They return the
//! events they produced and the caller hands them to the dispatcher once the
//! transaction has committed.

use chrono::{DateTime, Utc};

use super::chapter::ChapterContent;
use super::moderation::ReportTarget;
use super::restriction::RestrictionOrder;

/// Payload for a content safety scan
///
/// Text is always present; images are the stored page references of a
/// comic chapter and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInput {
    pub text: String,
    pub images: Vec<String>,
}

impl ScanInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// Title and author note are published text for both kinds, so they
    /// are scanned alongside the novel body or the comic pages.
    pub fn from_chapter(title: &str, note: Option<&str>, content: &ChapterContent) -> Self {
        let mut text = title.to_string();
        if let Some(note) = note {
            text.push_str("\n\n");
            text.push_str(note);
        }
        match content {
            ChapterContent::Novel { html } => {
                text.push_str("\n\n");
                text.push_str(html);
                Self::text(text)
            }
            ChapterContent::Comic { images } => Self {
                text,
                images: images.clone(),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.images.is_empty() {
            "text"
        } else {
            "text+images"
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    ChapterPublished {
        chapter_id: i64,
        version_id: String,
        published_at: DateTime<Utc>,
    },
    ChapterUnpublished {
        chapter_id: i64,
        version_id: String,
    },
    /// New user-generated content that should be scanned
    ContentCommitted {
        target: ReportTarget,
        input: ScanInput,
    },
    ReportsTransitioned {
        target: ReportTarget,
        affected: u64,
    },
    UserRestricted(RestrictionOrder),
}

/// Command result plus the events it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<DomainEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: DomainEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            events: self.events,
        }
    }

    /// Targets that need a content safety scan
    pub fn scan_targets(&self) -> impl Iterator<Item = &ReportTarget> {
        self.events.iter().filter_map(|event| match event {
            DomainEvent::ContentCommitted { target, .. } => Some(target),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novel_scan_input_includes_title() {
        let input = ScanInput::from_chapter(
            "Night",
            None,
            &ChapterContent::Novel {
                html: "<p>dark</p>".to_string(),
            },
        );
        assert_eq!(input, ScanInput::text("Night\n\n<p>dark</p>"));
        assert_eq!(input.kind(), "text");
    }

    #[test]
    fn comic_scan_input_keeps_title_and_note() {
        let input = ScanInput::from_chapter(
            "Explicit gore title",
            Some("see you next week"),
            &ChapterContent::Comic {
                images: vec!["pages/1.webp".to_string()],
            },
        );
        assert_eq!(input.text, "Explicit gore title\n\nsee you next week");
        assert_eq!(input.images, vec!["pages/1.webp".to_string()]);
        assert_eq!(input.kind(), "text+images");
    }

    #[test]
    fn outcome_collects_scan_targets() {
        let outcome = Outcome::new(1)
            .with_event(DomainEvent::ChapterUnpublished {
                chapter_id: 1,
                version_id: "v".to_string(),
            })
            .with_event(DomainEvent::ContentCommitted {
                target: ReportTarget::Content(1),
                input: ScanInput::text("title"),
            })
            .map(|value| value + 1);

        assert_eq!(outcome.value, 2);
        let targets: Vec<_> = outcome.scan_targets().copied().collect();
        assert_eq!(targets, vec![ReportTarget::Content(1)]);
    }
}
