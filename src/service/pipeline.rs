//! Post-commit event handling
//!
//! Commands return their events; handlers pass them to the
//! [`EventDispatcher`] after the response value is built. Content events are
//! scanned by the safety gate and flagged verdicts become system reports.

use std::sync::Arc;

use futures::future::join_all;

use crate::domain::DomainEvent;
use crate::service::{ContentSafetyGate, ModerationService};

/// Scans committed content and files system reports
pub struct ModerationPipeline {
    gate: ContentSafetyGate,
    ledger: ModerationService,
}

impl ModerationPipeline {
    pub fn new(gate: ContentSafetyGate, ledger: ModerationService) -> Self {
        Self { gate, ledger }
    }

    pub async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::ContentCommitted { target, input } => {
                let analysis = self.gate.scan(input).await;
                if !analysis.flagged {
                    return;
                }
                tracing::info!(
                    report_target = %target,
                    category = ?analysis.top_category().map(|c| c.category.as_str()),
                    "Content flagged"
                );
                if let Err(error) = self.ledger.file_system_report(*target, analysis).await {
                    tracing::error!(%error, report_target = %target, "Failed to file system report");
                }
            }
            DomainEvent::ChapterPublished {
                chapter_id,
                version_id,
                published_at,
            } => {
                tracing::debug!(chapter_id, version_id = %version_id, published_at = %published_at, "Chapter published");
            }
            DomainEvent::ChapterUnpublished {
                chapter_id,
                version_id,
            } => {
                tracing::debug!(chapter_id, version_id = %version_id, "Chapter unpublished");
            }
            DomainEvent::ReportsTransitioned { target, affected } => {
                tracing::debug!(report_target = %target, affected, "Reports transitioned");
            }
            DomainEvent::UserRestricted(order) => {
                tracing::debug!(
                    user_id = order.user_id,
                    kind = order.kind.as_str(),
                    until = %order.until,
                    "User restricted"
                );
            }
        }
    }
}

/// Hands command events to the pipeline off the request path
#[derive(Clone)]
pub struct EventDispatcher {
    pipeline: Arc<ModerationPipeline>,
}

impl EventDispatcher {
    pub fn new(pipeline: ModerationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Spawn handling of `events` on the runtime and return immediately
    pub fn dispatch(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            join_all(events.iter().map(|event| pipeline.handle(event))).await;
        });
    }

    /// Handle `events` to completion
    pub async fn process(&self, events: Vec<DomainEvent>) {
        join_all(events.iter().map(|event| self.pipeline.handle(event))).await;
    }
}
