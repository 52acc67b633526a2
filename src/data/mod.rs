//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite pool and read queries (`Database`)
//! - Transaction-scoped aggregate loads and saves (`store`)

mod database;
mod models;
pub mod store;

pub use database::Database;
pub use models::*;
