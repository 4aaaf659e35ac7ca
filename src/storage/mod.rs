//! SQLite catalog layer for chatvault.
//!
//! This module provides the queryable mirror of the archive using SQLite with:
//! - WAL mode so readers can query during a sync
//! - IMMEDIATE transactions for whole-package writes
//! - First-write-wins `created_at` on every upsert
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Catalog store implementation

pub mod schema;
pub mod sqlite;

pub use sqlite::{CatalogStore, Conversation, Message};
