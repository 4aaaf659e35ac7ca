//! Data models for chatvault.
//!
//! This module contains the ingestion-side domain models:
//! - `ConversationRef` - a discovered link from the conversation list
//! - `RawConversation` / `RawMessage` - loosely typed records from a fetcher
//! - `ConversationInput` / `MessageInput` - validated records ready to export
//!
//! Catalog rows (`Conversation`, `Message`) live in [`crate::storage`].

pub mod conversation;
pub mod reference;
pub mod timestamp;

pub use conversation::{ConversationInput, MessageInput, RawConversation, RawMessage};
pub use reference::ConversationRef;
pub use timestamp::{now_iso, parse_iso};
