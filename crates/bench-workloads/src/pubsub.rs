//! Publish/subscribe workloads.
//!
//! Both workloads subscribe before publishing and consume deliveries from the
//! [`Subscription`] channel on the publishing task itself, so the received
//! count and latency sum have a single writer.
//!
//! Note the asymmetry: throughput reports messages *published*, latency
//! reports messages *received*.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kv_client::{KvClient, ReceivedMessage, Subscription};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WorkloadError;
use crate::workload::{Deadline, KeySpace, Workload, WorkloadId};

/// Publishes between receipt confirmations.
pub const CONFIRM_EVERY: u64 = 1000;

/// Longest wait for a confirmation or the final drain.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after each latency probe.
pub const PUBLISH_PAUSE: Duration = Duration::from_millis(1);

/// Message body published on the benchmark channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    /// Publish time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: String,
}

impl Envelope {
    pub fn new(id: u64, data: impl Into<String>) -> Self {
        Self {
            id,
            timestamp: Utc::now().timestamp_millis(),
            data: data.into(),
        }
    }

    /// Milliseconds between publishing and `received_at`, never negative.
    pub fn latency_ms(&self, received_at: DateTime<Utc>) -> i64 {
        (received_at.timestamp_millis() - self.timestamp).max(0)
    }
}

/// Wait until `received` reaches `target` or `timeout` elapses.
///
/// Returns false on timeout or when the subscription ended.
async fn wait_for_receipts(
    subscription: &mut Subscription,
    received: &mut u64,
    target: u64,
    timeout: Duration,
) -> bool {
    let drain = async {
        while *received < target {
            match subscription.recv().await {
                Some(_) => *received += 1,
                None => return false,
            }
        }
        true
    };
    tokio::time::timeout(timeout, drain).await.unwrap_or(false)
}

/// Publish as fast as possible, confirming receipt every `CONFIRM_EVERY`
/// messages so the subscriber queue stays bounded.
#[derive(Debug, Clone)]
pub struct PubSubThroughput {
    keys: KeySpace,
}

impl PubSubThroughput {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for PubSubThroughput {
    fn id(&self) -> WorkloadId {
        WorkloadId::PubsubThroughput
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let channel = self.keys.channel("channel");
        let mut subscription = client.subscribe(&channel).await?;

        let deadline = Deadline::start(budget);
        let mut published = 0u64;
        let mut received = 0u64;

        while !deadline.expired() {
            let envelope = Envelope::new(published, format!("test_message_{published}"));
            client
                .publish(&channel, &serde_json::to_string(&envelope)?)
                .await?;
            published += 1;

            if published % CONFIRM_EVERY == 0
                && !wait_for_receipts(&mut subscription, &mut received, published, CONFIRM_TIMEOUT)
                    .await
            {
                debug!(
                    "Receipt confirmation timed out at {}/{} messages",
                    received, published
                );
            }
        }

        wait_for_receipts(&mut subscription, &mut received, published, CONFIRM_TIMEOUT).await;
        subscription.unsubscribe().await?;

        info!("Pub/Sub delivered {}/{} messages", received, published);
        Ok(published)
    }
}

/// Running latency totals, fed only by the consuming loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub received: u64,
    pub samples: u64,
    pub total_ms: i64,
}

impl LatencyStats {
    pub fn record(&mut self, message: &ReceivedMessage) {
        self.received += 1;
        match serde_json::from_str::<Envelope>(&message.payload) {
            Ok(envelope) => {
                self.samples += 1;
                self.total_ms += envelope.latency_ms(message.received_at);
            }
            Err(e) => warn!("Ignoring malformed latency probe: {}", e),
        }
    }

    pub fn average_ms(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.total_ms as f64 / self.samples as f64)
    }
}

/// Publish timestamped probes with a short pause and measure delivery delay.
///
/// Returns the number of messages received, not published.
#[derive(Debug, Clone)]
pub struct PubSubLatency {
    keys: KeySpace,
}

impl PubSubLatency {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for PubSubLatency {
    fn id(&self) -> WorkloadId {
        WorkloadId::PubsubLatency
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let channel = self.keys.channel("latency");
        let mut subscription = client.subscribe(&channel).await?;

        let deadline = Deadline::start(budget);
        let mut published = 0u64;
        let mut stats = LatencyStats::default();

        while !deadline.expired() {
            let envelope = Envelope::new(published, format!("latency_test_{published}"));
            client
                .publish(&channel, &serde_json::to_string(&envelope)?)
                .await?;
            published += 1;

            while let Some(message) = subscription.try_recv() {
                stats.record(&message);
            }
            tokio::time::sleep(PUBLISH_PAUSE).await;
        }

        let drain = async {
            while stats.received < published {
                match subscription.recv().await {
                    Some(message) => stats.record(&message),
                    None => break,
                }
            }
        };
        if tokio::time::timeout(CONFIRM_TIMEOUT, drain).await.is_err() {
            debug!(
                "Latency drain timed out at {}/{} messages",
                stats.received, published
            );
        }
        subscription.unsubscribe().await?;

        if let Some(average) = stats.average_ms() {
            info!("Average Pub/Sub latency: {:.2}ms", average);
        }
        Ok(stats.received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(payload: &str, received_at: DateTime<Utc>) -> ReceivedMessage {
        ReceivedMessage {
            channel: "{test}:pubsub:latency".to_string(),
            payload: payload.to_string(),
            received_at,
        }
    }

    #[test]
    fn test_envelope_wire_format() {
        let envelope = Envelope {
            id: 3,
            timestamp: 1_700_000_000_000,
            data: "test_message_3".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"id":3,"timestamp":1700000000000,"data":"test_message_3"}"#
        );
    }

    #[test]
    fn test_latency_stats_average() {
        let received_at = Utc.timestamp_millis_opt(1_700_000_000_010).unwrap();
        let mut stats = LatencyStats::default();

        stats.record(&message(
            r#"{"id":0,"timestamp":1700000000000,"data":"a"}"#,
            received_at,
        ));
        stats.record(&message(
            r#"{"id":1,"timestamp":1700000000006,"data":"b"}"#,
            received_at,
        ));

        assert_eq!(stats.received, 2);
        assert_eq!(stats.total_ms, 14);
        assert_eq!(stats.average_ms(), Some(7.0));
    }

    #[test]
    fn test_malformed_probe_counts_as_received_only() {
        let mut stats = LatencyStats::default();
        stats.record(&message("not json", Utc::now()));

        assert_eq!(stats.received, 1);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.average_ms(), None);
    }

    #[test]
    fn test_latency_clamped_at_zero() {
        let envelope = Envelope {
            id: 0,
            timestamp: 1_700_000_000_100,
            data: String::new(),
        };
        let earlier = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(envelope.latency_ms(earlier), 0);
    }
}
