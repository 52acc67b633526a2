//! Session authentication
//!
//! Handles:
//! - Signed session tokens
//! - Request extractors resolving the calling user

mod middleware;
pub mod session;

pub use middleware::{CurrentUser, MaybeUser, Moderator};
pub use session::{Session, create_session_token, verify_session_token};
