//! Trait definitions for key-value clients.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TargetConfig;
use crate::error::Result;
use crate::subscription::Subscription;

/// One endpoint that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scan failed on {endpoint}: {message}")]
pub struct ScanError {
    pub endpoint: String,
    pub message: String,
}

/// Keys found by a scan across every endpoint of a target.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub keys: Vec<String>,
    /// Endpoints skipped because they failed mid-scan.
    pub failures: Vec<ScanError>,
}

/// Version reported by one server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub endpoint: String,
    pub version: Option<String>,
}

/// Operations the benchmark workloads need from a key-value store.
///
/// Every method is a single round trip (or a single pipeline) so that
/// workloads can count confirmed operations.
#[async_trait::async_trait]
pub trait KvClient: Send + Sync {
    /// Name of the target this client talks to.
    fn target(&self) -> &str;

    /// `SET key value`, with a `PX` expiry when given.
    async fn set(&self, key: &str, value: &str, expiry: Option<Duration>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `HSET key field value [field value ...]`
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    async fn rpush(&self, key: &str, value: &str) -> Result<()>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Send every `SET` in one non-atomic pipeline and wait for all replies.
    ///
    /// Returns the number of confirmed writes.
    async fn batch_set(&self, entries: &[(String, String)]) -> Result<u64>;

    /// Write every entry inside one `MULTI`/`EXEC` transaction.
    async fn transaction_set(&self, entries: &[(String, String)]) -> Result<()>;

    /// Cursor-scan every reachable endpoint for keys matching `pattern`.
    async fn scan(&self, pattern: &str, page_size: usize) -> Result<ScanOutcome>;

    /// Returns true when the key existed.
    async fn del(&self, key: &str) -> Result<bool>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Subscribe to `channel`. Messages are delivered through the returned
    /// [`Subscription`] until it is unsubscribed or dropped.
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;

    /// Server versions, one entry per endpoint. Requires `allow_admin`.
    async fn server_info(&self) -> Result<Vec<ServerInfo>>;

    /// Release the connection. Later calls fail with `NotConnected`.
    async fn close(&self);
}

/// Opens clients for configured targets.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &TargetConfig) -> Result<Arc<dyn KvClient>>;
}
