//! Series and volume rules

use serde::{Deserialize, Serialize};

use super::chapter::ChapterContent;
use crate::error::AppError;

pub const SERIES_TITLE_MAX_CHARS: usize = 255;
pub const SYNOPSIS_MAX_CHARS: usize = 5000;
pub const VOLUME_TITLE_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Novel,
    Comic,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novel => "novel",
            Self::Comic => "comic",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "novel" => Ok(Self::Novel),
            "comic" => Ok(Self::Comic),
            other => Err(AppError::Validation(format!("unknown series kind: {other}"))),
        }
    }

    /// Chapters of a novel series carry HTML, comic chapters carry pages.
    pub fn accepts(&self, content: &ChapterContent) -> bool {
        matches!(
            (self, content),
            (Self::Novel, ChapterContent::Novel { .. }) | (Self::Comic, ChapterContent::Comic { .. })
        )
    }
}

pub fn validate_series_title(title: &str) -> Result<String, AppError> {
    bounded(title, SERIES_TITLE_MAX_CHARS, "title")
}

pub fn validate_volume_title(title: &str) -> Result<String, AppError> {
    bounded(title, VOLUME_TITLE_MAX_CHARS, "volume title")
}

pub fn validate_synopsis(synopsis: Option<&str>) -> Result<Option<String>, AppError> {
    match synopsis.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) if s.chars().count() > SYNOPSIS_MAX_CHARS => Err(AppError::Validation(format!(
            "synopsis must be at most {SYNOPSIS_MAX_CHARS} characters"
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

fn bounded(value: &str, max: usize, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(AppError::Validation(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(value.to_string())
}
