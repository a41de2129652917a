//! Key enumeration workload.

use std::time::Duration;

use kv_client::KvClient;
use tracing::{debug, warn};

use crate::error::WorkloadError;
use crate::workload::{KeySpace, Workload, WorkloadId};

/// `COUNT` hint passed to each `SCAN` call.
pub const SCAN_PAGE_SIZE: usize = 100;

/// Keys seeded when a scan finds nothing.
pub const SEED_KEYS: u64 = 100;

/// Scan every endpoint once for keys in the namespace and count them.
///
/// This workload does not loop on the budget: it makes exactly one pass.
/// An empty namespace is seeded with `SEED_KEYS` keys so the next pass has
/// something to find. Endpoints that fail mid-scan are logged and skipped.
#[derive(Debug, Clone)]
pub struct KeyScan {
    keys: KeySpace,
}

impl KeyScan {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for KeyScan {
    fn id(&self) -> WorkloadId {
        WorkloadId::KeyScan
    }

    async fn run(&self, client: &dyn KvClient, _budget: Duration) -> Result<u64, WorkloadError> {
        let outcome = client.scan(&self.keys.pattern(), SCAN_PAGE_SIZE).await?;
        for failure in &outcome.failures {
            warn!("Error scanning keys on {}: {}", failure.endpoint, failure.message);
        }

        let count = outcome.keys.len() as u64;
        if count == 0 {
            debug!(
                "No keys matched {}, seeding {} keys",
                self.keys.pattern(),
                SEED_KEYS
            );
            for i in 0..SEED_KEYS {
                client
                    .set(&self.keys.key("search:dummy", i), &format!("value_{i}"), None)
                    .await?;
            }
        }

        Ok(count)
    }
}
