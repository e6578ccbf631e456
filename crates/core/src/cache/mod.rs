//! SQLite-backed store of named response caches.
//!
//! This module provides a persistent request -> response store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named caches created lazily on first write and dropped wholesale
//! - Request keys derived from method and URL via SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - An optional byte quota across all caches

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod names;

pub use crate::Error;

use chrono::{DateTime, SecondsFormat, Utc};

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use names::CacheStats;

/// Fixed-width UTC timestamp; these columns sort correctly as text.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
