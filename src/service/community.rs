//! Community service
//!
//! Comments on chapters and reviews of series. Both are guarded by the
//! author's mute state and produce a content scan event.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::data::{Comment, Database, Review, User, store};
use crate::domain::{DomainEvent, GuardedAction, Outcome, ReportTarget, ScanInput};
use crate::error::AppError;
use crate::service::ReaderService;
use crate::service::restriction;

pub const COMMENT_MAX_CHARS: usize = 2000;
pub const REVIEW_MAX_CHARS: usize = 5000;

fn validate_text(text: &str, max: usize, field: &str) -> Result<String, AppError> {
    let text = text.trim();
    let len = text.chars().count();
    if len == 0 || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(text.to_string())
}

/// Community service
pub struct CommunityService {
    db: Arc<Database>,
}

impl CommunityService {
    /// Create new community service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Comment on a chapter the author can currently read
    pub async fn post_comment(
        &self,
        author: &User,
        chapter_id: i64,
        text: &str,
    ) -> Result<Outcome<Comment>, AppError> {
        let text = validate_text(text, COMMENT_MAX_CHARS, "comment")?;
        if !ReaderService::new(self.db.clone())
            .can_read(Some(author), chapter_id)
            .await?
        {
            return Err(AppError::NotFound);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let comment = Comment {
            id: id.to_string(),
            chapter_id,
            author_id: author.id,
            content: html_escape::encode_text(&text).into_owned(),
            created_at: now,
        };

        let mut tx = self.db.begin().await?;
        restriction::guard(&mut tx, author.id, GuardedAction::Comment, now).await?;
        store::insert_comment(&mut tx, &comment).await?;
        tx.commit().await?;

        tracing::debug!(comment_id = %id, chapter_id, author_id = author.id, "Comment posted");

        Ok(Outcome::new(comment).with_event(DomainEvent::ContentCommitted {
            target: ReportTarget::Comment(id),
            input: ScanInput::text(text),
        }))
    }

    /// Review a series with a 1..=5 rating
    pub async fn post_review(
        &self,
        author: &User,
        series_id: i64,
        rating: i64,
        text: &str,
    ) -> Result<Outcome<Review>, AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        let text = validate_text(text, REVIEW_MAX_CHARS, "review")?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let review = Review {
            id: id.to_string(),
            series_id,
            author_id: author.id,
            rating,
            content: html_escape::encode_text(&text).into_owned(),
            created_at: now,
        };

        let mut tx = self.db.begin().await?;
        store::get_series(&mut tx, series_id).await?;
        restriction::guard(&mut tx, author.id, GuardedAction::Review, now).await?;
        store::insert_review(&mut tx, &review).await?;
        tx.commit().await?;

        tracing::debug!(review_id = %id, series_id, author_id = author.id, "Review posted");

        Ok(Outcome::new(review).with_event(DomainEvent::ContentCommitted {
            target: ReportTarget::Review(id),
            input: ScanInput::text(text),
        }))
    }
}
