//! String-value workloads.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use kv_client::KvClient;
use serde_json::json;

use crate::error::WorkloadError;
use crate::workload::{Deadline, KeySpace, Workload, WorkloadId};

/// Size of the value written by the large-value workload.
pub const LARGE_VALUE_SIZE: usize = 10 * 1024;

/// Expiry attached by the expiring-write workload.
pub const EXPIRY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
enum Payload {
    /// The counter itself.
    Counter,
    Fixed(String),
}

/// `SET` one key per iteration.
///
/// Covers single-set, large-value-set and set-with-expiry, which differ only
/// in key kind, value and expiry.
#[derive(Debug, Clone)]
pub struct StringWrite {
    id: WorkloadId,
    keys: KeySpace,
    kind: &'static str,
    payload: Payload,
    expiry: Option<Duration>,
}

impl StringWrite {
    pub fn single(keys: KeySpace) -> Self {
        Self {
            id: WorkloadId::SingleSet,
            keys,
            kind: "single",
            payload: Payload::Counter,
            expiry: None,
        }
    }

    pub fn large(keys: KeySpace) -> Self {
        Self {
            id: WorkloadId::LargeValueSet,
            keys,
            kind: "large",
            payload: Payload::Fixed("X".repeat(LARGE_VALUE_SIZE)),
            expiry: None,
        }
    }

    pub fn expiring(keys: KeySpace) -> Self {
        Self {
            id: WorkloadId::SetWithExpiry,
            keys,
            kind: "expire",
            payload: Payload::Counter,
            expiry: Some(EXPIRY),
        }
    }
}

#[async_trait::async_trait]
impl Workload for StringWrite {
    fn id(&self) -> WorkloadId {
        self.id
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            let key = self.keys.key(self.kind, count);
            match &self.payload {
                Payload::Counter => client.set(&key, &count.to_string(), self.expiry).await?,
                Payload::Fixed(value) => client.set(&key, value, self.expiry).await?,
            }
            count += 1;
        }

        Ok(count)
    }
}

/// Write key `n`, then read key `n - 1`. One iteration counts once.
#[derive(Debug, Clone)]
pub struct MixedReadWrite {
    keys: KeySpace,
}

impl MixedReadWrite {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for MixedReadWrite {
    fn id(&self) -> WorkloadId {
        WorkloadId::MixedReadWrite
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            client
                .set(&self.keys.key("rw", count), &count.to_string(), None)
                .await?;
            client
                .get(&self.keys.key("rw", count.saturating_sub(1)))
                .await?;
            count += 1;
        }

        Ok(count)
    }
}

/// Serialize a nested document and store it as a string.
#[derive(Debug, Clone)]
pub struct JsonDocumentSet {
    keys: KeySpace,
}

impl JsonDocumentSet {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

/// The document written for iteration `id`.
pub fn document(id: u64) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "id": id,
        "timestamp": now.to_rfc3339_opts(SecondsFormat::Micros, true),
        "data": {
            "array": [1, 2, 3, 4, 5],
            "nested": {
                "field1": "value1",
                "field2": id,
                "field3": {
                    "subfield1": "subvalue1",
                    "subfield2": now.timestamp_nanos_opt().unwrap_or_default(),
                }
            }
        }
    })
}

#[async_trait::async_trait]
impl Workload for JsonDocumentSet {
    fn id(&self) -> WorkloadId {
        WorkloadId::JsonDocumentSet
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            let body = serde_json::to_string(&document(count))?;
            client
                .set(&self.keys.key("complexjson", count), &body, None)
                .await?;
            count += 1;
        }

        Ok(count)
    }
}
