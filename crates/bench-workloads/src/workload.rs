//! The workload abstraction and catalog identifiers.

use std::fmt::Display;
use std::time::{Duration, Instant};

use kv_client::KvClient;
use serde::{Deserialize, Serialize};

use crate::error::WorkloadError;
use crate::{pubsub, scan, strings, structures};

/// One access pattern run against a client for a time budget.
#[async_trait::async_trait]
pub trait Workload: Send + Sync {
    fn id(&self) -> WorkloadId;

    /// Name shown in progress output and reports.
    fn name(&self) -> &'static str {
        self.id().display_name()
    }

    fn is_time_bounded(&self) -> bool {
        self.id().is_time_bounded()
    }

    /// Run until `budget` has elapsed and return the number of operations.
    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError>;
}

/// Identifier of every workload in the catalog, in catalog order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadId {
    SingleSet,
    BatchedSet,
    LargeValueSet,
    HashSet,
    ListPush,
    SortedSetAdd,
    TransactionalSet,
    MixedReadWrite,
    SetWithExpiry,
    JsonDocumentSet,
    PipelinedSet,
    KeyScan,
    PubsubThroughput,
    PubsubLatency,
}

impl WorkloadId {
    pub const ALL: [WorkloadId; 14] = [
        WorkloadId::SingleSet,
        WorkloadId::BatchedSet,
        WorkloadId::LargeValueSet,
        WorkloadId::HashSet,
        WorkloadId::ListPush,
        WorkloadId::SortedSetAdd,
        WorkloadId::TransactionalSet,
        WorkloadId::MixedReadWrite,
        WorkloadId::SetWithExpiry,
        WorkloadId::JsonDocumentSet,
        WorkloadId::PipelinedSet,
        WorkloadId::KeyScan,
        WorkloadId::PubsubThroughput,
        WorkloadId::PubsubLatency,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            WorkloadId::SingleSet => "Single operation",
            WorkloadId::BatchedSet => "Batch operation",
            WorkloadId::LargeValueSet => "Large data processing",
            WorkloadId::HashSet => "Hash operation",
            WorkloadId::ListPush => "List operation",
            WorkloadId::SortedSetAdd => "Sorted set",
            WorkloadId::TransactionalSet => "Transaction",
            WorkloadId::MixedReadWrite => "Read/Write mixed",
            WorkloadId::SetWithExpiry => "Key expiration setting",
            WorkloadId::JsonDocumentSet => "Complex JSON",
            WorkloadId::PipelinedSet => "Pipeline",
            WorkloadId::KeyScan => "Key Search",
            WorkloadId::PubsubThroughput => "Pub/Sub",
            WorkloadId::PubsubLatency => "Pub/Sub Latency",
        }
    }

    /// Key Search makes a single pass and ignores the budget.
    pub fn is_time_bounded(self) -> bool {
        !matches!(self, WorkloadId::KeyScan)
    }

    /// What the returned count measures, when it is not "operations issued".
    pub fn count_note(self) -> Option<&'static str> {
        match self {
            WorkloadId::KeyScan => Some("keys found in one pass"),
            WorkloadId::PubsubThroughput => Some("messages published"),
            WorkloadId::PubsubLatency => Some("messages received"),
            _ => None,
        }
    }

    pub fn build(self, keys: &KeySpace) -> Box<dyn Workload> {
        let keys = keys.clone();
        match self {
            WorkloadId::SingleSet => Box::new(strings::StringWrite::single(keys)),
            WorkloadId::BatchedSet => Box::new(structures::ChunkedSet::batch(keys)),
            WorkloadId::LargeValueSet => Box::new(strings::StringWrite::large(keys)),
            WorkloadId::HashSet => Box::new(structures::HashWrite::new(keys)),
            WorkloadId::ListPush => Box::new(structures::ListPush::new(keys)),
            WorkloadId::SortedSetAdd => Box::new(structures::SortedSetAdd::new(keys)),
            WorkloadId::TransactionalSet => Box::new(structures::TransactionalSet::new(keys)),
            WorkloadId::MixedReadWrite => Box::new(strings::MixedReadWrite::new(keys)),
            WorkloadId::SetWithExpiry => Box::new(strings::StringWrite::expiring(keys)),
            WorkloadId::JsonDocumentSet => Box::new(strings::JsonDocumentSet::new(keys)),
            WorkloadId::PipelinedSet => Box::new(structures::ChunkedSet::pipeline(keys)),
            WorkloadId::KeyScan => Box::new(scan::KeyScan::new(keys)),
            WorkloadId::PubsubThroughput => Box::new(pubsub::PubSubThroughput::new(keys)),
            WorkloadId::PubsubLatency => Box::new(pubsub::PubSubLatency::new(keys)),
        }
    }
}

impl std::fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Key naming for one benchmark namespace.
///
/// Plain keys share the `{ns}` hash tag, so they all live in one cluster
/// slot. Multi-key batches use `{ns:<group>}` tags to spread across slots
/// while keeping each batch in a single slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `{ns}:<kind>:<id>`
    pub fn key(&self, kind: &str, id: impl Display) -> String {
        format!("{{{}}}:{kind}:{id}", self.namespace)
    }

    /// `{ns}:<kind>`
    pub fn fixed(&self, kind: &str) -> String {
        format!("{{{}}}:{kind}", self.namespace)
    }

    /// `{ns:<group>}`
    pub fn tag(&self, group: u64) -> String {
        format!("{{{}:{group}}}", self.namespace)
    }

    /// Pattern matching every plain key.
    pub fn pattern(&self) -> String {
        format!("{{{}}}:*", self.namespace)
    }

    /// Patterns matching every key a run can create.
    pub fn cleanup_patterns(&self) -> [String; 2] {
        [self.pattern(), format!("{{{}:*}}:*", self.namespace)]
    }

    /// `{ns}:pubsub:<name>`
    pub fn channel(&self, name: &str) -> String {
        format!("{{{}}}:pubsub:{name}", self.namespace)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("test")
    }
}

/// Elapsed-time check, evaluated once per loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_space_layout() {
        let keys = KeySpace::default();
        assert_eq!(keys.key("single", 7), "{test}:single:7");
        assert_eq!(keys.fixed("sortedset"), "{test}:sortedset");
        assert_eq!(keys.tag(3), "{test:3}");
        assert_eq!(keys.pattern(), "{test}:*");
        assert_eq!(keys.channel("latency"), "{test}:pubsub:latency");
        assert_eq!(
            keys.cleanup_patterns(),
            ["{test}:*".to_string(), "{test:*}:*".to_string()]
        );
    }

    #[test]
    fn test_zero_budget_is_expired() {
        assert!(Deadline::start(Duration::ZERO).expired());
        assert!(!Deadline::start(Duration::from_secs(60)).expired());
    }

    #[test]
    fn test_only_key_scan_is_single_pass() {
        let single_pass: Vec<_> = WorkloadId::ALL
            .iter()
            .filter(|id| !id.is_time_bounded())
            .collect();
        assert_eq!(single_pass, vec![&WorkloadId::KeyScan]);
    }

    #[test]
    fn test_build_preserves_identity() {
        let keys = KeySpace::default();
        for id in WorkloadId::ALL {
            assert_eq!(id.build(&keys).id(), id);
        }
    }
}
