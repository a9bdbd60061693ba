//! # Card Graph Common Library
//!
//! Shared code for the Card Graph service:
//! - Error type
//! - Configuration loading and root folder resolution
//! - SQLite initialization and schema migrations
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
