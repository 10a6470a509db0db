//! In-process pub/sub hub for streaming job progress to clients.
//!
//! Topic-keyed broadcast channels bridge the pipeline runner (producer) to
//! SSE endpoints (consumers). Payloads are `serde_json::Value` with a `type`
//! field that becomes the SSE event name (`progress`, `done`, `batch_error`).
//!
//! Producers (runner):
//!   hub.publish(&StreamHub::job_topic(job_id), frame.to_value()).await;
//!
//! Consumers (SSE route):
//!   let rx = hub.subscribe(&StreamHub::job_topic(job_id)).await;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::common::JobId;

/// Thread-safe, cloneable pub/sub hub keyed by string topics.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (128 frames per channel).
    pub fn new() -> Self {
        Self::with_capacity(128)
    }

    /// Create a new StreamHub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// The progress topic for a job.
    pub fn job_topic(job_id: JobId) -> String {
        format!("jobs:{}", job_id)
    }

    /// Publish a JSON frame to a topic. No-op if no subscribers.
    pub async fn publish(&self, topic: &str, value: serde_json::Value) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(topic) {
            // Ignore send errors (no active receivers)
            let _ = tx.send(value);
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    ///
    /// Channels left behind by disconnected clients are pruned here, so the
    /// map stays bounded by the number of live subscriptions.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        self.cleanup().await;
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let hub = StreamHub::new();
        let topic = StreamHub::job_topic(JobId::new());
        let mut rx = hub.subscribe(&topic).await;

        let frame = serde_json::json!({"type": "progress", "processed": 10, "total": 200});
        hub.publish(&topic, frame.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = StreamHub::new();
        // Should not panic
        hub.publish("jobs:nobody", serde_json::json!({"type": "done"}))
            .await;
    }

    #[tokio::test]
    async fn cleanup_removes_empty_channels() {
        let hub = StreamHub::new();
        let rx = hub.subscribe("jobs:ephemeral").await;

        assert_eq!(hub.channels.read().await.len(), 1);

        drop(rx);
        hub.cleanup().await;

        assert_eq!(hub.channels.read().await.len(), 0);
    }

    #[tokio::test]
    async fn subscribe_prunes_dead_channels() {
        let hub = StreamHub::new();
        let rx = hub.subscribe("jobs:gone").await;
        drop(rx);

        let _rx = hub.subscribe("jobs:live").await;

        let channels = hub.channels.read().await;
        assert_eq!(channels.len(), 1);
        assert!(channels.contains_key("jobs:live"));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let hub = StreamHub::new();
        let mut rx1 = hub.subscribe("jobs:multi").await;
        let mut rx2 = hub.subscribe("jobs:multi").await;

        let frame = serde_json::json!({"type": "progress"});
        hub.publish("jobs:multi", frame.clone()).await;

        assert_eq!(rx1.recv().await.unwrap(), frame);
        assert_eq!(rx2.recv().await.unwrap(), frame);
    }
}
