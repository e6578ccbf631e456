//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Request/response types the cache strategies branch on
//! - Request classification (strategy + cache class)
//! - Named cache store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod route;

pub use cache::{CacheDb, CacheStats, CachedEntry};
pub use config::{CacheDurations, ConfigError, WorkerConfig};
pub use error::Error;
pub use http::{Destination, Method, Request, RequestMode, Response, ResponseType};
pub use route::{CacheClass, Route, Scope, Strategy, classify};
