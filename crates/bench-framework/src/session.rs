//! Per-target benchmark session.

use std::sync::Arc;

use bench_workloads::KeySpace;
use kv_client::{Connector, KvClient, TargetConfig};
use tracing::{debug, info, warn};

use crate::error::BenchError;
use crate::metrics::WorkloadResult;

/// Page size used when enumerating keys for cleanup.
const CLEANUP_SCAN_PAGE: usize = 1000;

/// One target's connection and accumulated results.
///
/// The session exclusively owns its client. Results are append-only and
/// survive [`ClusterSession::close`], so the comparison can be built after
/// every connection is gone.
pub struct ClusterSession {
    config: TargetConfig,
    client: Option<Arc<dyn KvClient>>,
    results: Vec<WorkloadResult>,
    failure: Option<String>,
}

impl ClusterSession {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            client: None,
            results: Vec::new(),
            failure: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Connect to the target.
    ///
    /// Fails only when the connector refuses, i.e. the target is unreachable
    /// with fail-fast on. Server versions are logged when admin commands are
    /// allowed.
    pub async fn open(&mut self, connector: &dyn Connector) -> Result<(), BenchError> {
        let client = connector
            .connect(&self.config)
            .await
            .map_err(|source| BenchError::Connection {
                target: self.config.name.clone(),
                source,
            })?;

        if self.config.allow_admin {
            match client.server_info().await {
                Ok(servers) => {
                    for server in servers {
                        info!(
                            "{} {}: version {}",
                            self.config.name,
                            server.endpoint,
                            server.version.as_deref().unwrap_or("unknown")
                        );
                    }
                }
                Err(e) => warn!("Could not read server info for {}: {}", self.config.name, e),
            }
        }

        self.client = Some(client);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Result<Arc<dyn KvClient>, BenchError> {
        self.client
            .clone()
            .ok_or_else(|| BenchError::NotOpen(self.config.name.clone()))
    }

    pub fn record(&mut self, result: WorkloadResult) {
        self.results.push(result);
    }

    /// Results in the order they were recorded.
    pub fn results(&self) -> &[WorkloadResult] {
        &self.results
    }

    pub fn result(&self, workload: &str) -> Option<&WorkloadResult> {
        self.results.iter().find(|r| r.workload == workload)
    }

    /// Why the catalog stopped early, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    /// Delete every key the run may have created. Returns the number removed.
    ///
    /// Best-effort: failures are logged and never propagated.
    pub async fn cleanup(&self, keys: &KeySpace) -> u64 {
        let Some(client) = &self.client else {
            return 0;
        };

        let mut removed = 0u64;
        for pattern in keys.cleanup_patterns() {
            let outcome = match client.scan(&pattern, CLEANUP_SCAN_PAGE).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Error occurred during key cleanup on {}: {}", self.name(), e);
                    continue;
                }
            };
            for failure in &outcome.failures {
                warn!(
                    "Error occurred during key cleanup on {}: {}",
                    failure.endpoint, failure.message
                );
            }

            for key in &outcome.keys {
                match client.del(key).await {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error occurred during key cleanup on {}: {}", self.name(), e);
                    }
                }
            }
        }

        debug!("Removed {} keys from {}", removed, self.name());
        removed
    }

    /// Release the client. Safe to call more than once and after a failed open.
    pub async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().await;
            debug!("{} session closed", self.name());
        }
    }
}

impl std::fmt::Debug for ClusterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSession")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("results", &self.results)
            .field("failure", &self.failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_client::{MemoryClient, MemoryConnector};

    fn target(name: &str) -> TargetConfig {
        TargetConfig::new(name, vec!["127.0.0.1:7002".to_string()])
    }

    #[tokio::test]
    async fn test_client_requires_open() {
        let session = ClusterSession::new(target("Garnet"));
        assert!(matches!(session.client(), Err(BenchError::NotOpen(name)) if name == "Garnet"));
    }

    #[tokio::test]
    async fn test_fail_fast_open_is_connection_error() {
        let connector = MemoryConnector::new().with_unreachable("Garnet");
        let mut session = ClusterSession::new(target("Garnet").with_fail_fast(true));

        let err = session.open(&connector).await.unwrap_err();
        assert!(matches!(err, BenchError::Connection { ref target, .. } if target == "Garnet"));
        assert!(!session.is_open());

        session.close().await;
    }

    #[tokio::test]
    async fn test_lazy_open_fails_on_first_use() {
        let connector = MemoryConnector::new().with_unreachable("Garnet");
        let mut session = ClusterSession::new(target("Garnet"));

        session.open(&connector).await.unwrap();
        let client = session.client().unwrap();
        assert!(client.set("{test}:single:0", "0", None).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_namespace_keys_only() {
        let connector = MemoryConnector::new();
        let mut session = ClusterSession::new(target("Redis"));
        session.open(&connector).await.unwrap();

        let client = session.client().unwrap();
        client.set("{test}:single:0", "0", None).await.unwrap();
        client
            .batch_set(&[("{test:0}:batch:0".to_string(), "0".to_string())])
            .await
            .unwrap();
        client.set("{other}:single:0", "0", None).await.unwrap();

        assert_eq!(session.cleanup(&KeySpace::default()).await, 2);

        let store = connector.client("Redis").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("{other}:single:0"));
    }

    #[tokio::test]
    async fn test_cleanup_continues_past_failed_delete() {
        let connector = MemoryConnector::new()
            .with_client(MemoryClient::new("Redis").with_undeletable("{test}:single:1"));
        let mut session = ClusterSession::new(target("Redis"));
        session.open(&connector).await.unwrap();

        let client = session.client().unwrap();
        for i in 0..5 {
            client.set(&format!("{{test}}:single:{i}"), "0", None).await.unwrap();
        }

        assert_eq!(session.cleanup(&KeySpace::default()).await, 4);

        let store = connector.client("Redis").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("{test}:single:1"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connector = MemoryConnector::new();
        let mut session = ClusterSession::new(target("Redis"));
        session.open(&connector).await.unwrap();
        session.record(WorkloadResult::new("Single operation", 1, std::time::Duration::from_millis(1)));

        session.close().await;
        session.close().await;

        assert!(!session.is_open());
        assert!(connector.client("Redis").unwrap().is_closed());
        assert!(session.result("Single operation").is_some());
    }
}
