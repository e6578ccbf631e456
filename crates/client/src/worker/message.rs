//! Messages posted to the worker by the pages it controls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swcache_core::Error;

use super::CacheManager;

/// A message understood by the worker, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Page performance timings to forward to the metrics endpoint.
    PerformanceMetrics {
        #[serde(default)]
        metrics: Value,
    },
    #[serde(other)]
    Unknown,
}

/// Receives forwarded performance metrics.
#[async_trait::async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, metrics: Value) -> Result<(), Error>;
}

/// Writes metrics to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

#[async_trait::async_trait]
impl MetricsSink for LogMetricsSink {
    async fn record(&self, metrics: Value) -> Result<(), Error> {
        tracing::info!(metrics = %metrics, "performance metrics");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageOutcome {
    Forwarded,
    Ignored,
}

impl CacheManager {
    /// Dispatch a posted message.
    ///
    /// Unknown message types are ignored. A failing sink is logged; the
    /// message still counts as forwarded.
    pub async fn handle_message(&self, message: &Value) -> Result<MessageOutcome, Error> {
        let message = WorkerMessage::deserialize(message)
            .map_err(|e| Error::InvalidInput(format!("malformed worker message: {e}")))?;

        match message {
            WorkerMessage::PerformanceMetrics { metrics } => {
                if let Err(e) = self.inner.metrics.record(metrics).await {
                    tracing::warn!("failed to forward performance metrics: {e}");
                }
                Ok(MessageOutcome::Forwarded)
            }
            WorkerMessage::Unknown => {
                tracing::debug!("ignoring unknown worker message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }
}
