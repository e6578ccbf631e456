//! Client side of swcache.
//!
//! This crate provides the network collaborator and the offline cache worker
//! that combines it with the cache store.

pub mod fetch;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{FetchConfig, HttpNetwork, Network};
pub use worker::{
    ActivateReport, CacheManager, FailedAsset, InstallReport, LogMetricsSink, MessageOutcome, MetricsSink,
    Notification, NotificationAction, PushPayload, WorkerMessage, WorkerState, WorkerStats,
};
