//! chatvault - incremental archiver for threaded chat conversations
//!
//! This crate provides the core functionality for the `cv` CLI tool.
//!
//! # Architecture
//!
//! - [`acquire`] - Browser-driven discovery and message extraction
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (ConversationRef, RawConversation, RawMessage)
//! - [`storage`] - SQLite catalog
//! - [`sync`] - Change detection, archive export and catalog rebuild
//! - [`config`] - Settings and per-run configuration
//! - [`validate`] - Checks applied to extracted conversations
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquire;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
