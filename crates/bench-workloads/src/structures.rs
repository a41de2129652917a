//! Batched, transactional and data-structure workloads.

use std::time::Duration;

use kv_client::KvClient;

use crate::error::WorkloadError;
use crate::workload::{Deadline, KeySpace, Workload, WorkloadId};

/// Writes per pipeline round trip.
pub const CHUNK_SIZE: usize = 100;

/// List keys rotate after this many pushes.
pub const LIST_ROTATION: u64 = 100;

/// Pipelined `SET`s, `CHUNK_SIZE` per round trip.
///
/// Every key in a chunk carries the `{ns:<n / partition_span>}` tag so a
/// chunk never spans cluster slots. Only confirmed writes are counted.
#[derive(Debug, Clone)]
pub struct ChunkedSet {
    id: WorkloadId,
    keys: KeySpace,
    label: &'static str,
    partition_span: u64,
}

impl ChunkedSet {
    pub fn batch(keys: KeySpace) -> Self {
        Self {
            id: WorkloadId::BatchedSet,
            keys,
            label: "batch",
            partition_span: 1000,
        }
    }

    pub fn pipeline(keys: KeySpace) -> Self {
        Self {
            id: WorkloadId::PipelinedSet,
            keys,
            label: "pipeline",
            partition_span: 100,
        }
    }

    fn next_chunk(&self, start: u64, deadline: &Deadline) -> Vec<(String, String)> {
        let tag = self.keys.tag(start / self.partition_span);
        let mut entries = Vec::with_capacity(CHUNK_SIZE);
        let mut n = start;

        for i in 0..CHUNK_SIZE {
            if deadline.expired() {
                break;
            }
            entries.push((format!("{tag}:{}:{i}", self.label), n.to_string()));
            n += 1;
        }

        entries
    }
}

#[async_trait::async_trait]
impl Workload for ChunkedSet {
    fn id(&self) -> WorkloadId {
        self.id
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            let chunk = self.next_chunk(count, &deadline);
            if chunk.is_empty() {
                break;
            }
            count += client.batch_set(&chunk).await?;
        }

        Ok(count)
    }
}

/// `HSET` a three-field hash per iteration.
#[derive(Debug, Clone)]
pub struct HashWrite {
    keys: KeySpace,
}

impl HashWrite {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

fn hash_fields(n: u64) -> Vec<(String, String)> {
    (1..=3)
        .map(|field| (format!("field{field}"), format!("value{field}_{n}")))
        .collect()
}

#[async_trait::async_trait]
impl Workload for HashWrite {
    fn id(&self) -> WorkloadId {
        WorkloadId::HashSet
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            client
                .hset(&self.keys.key("hash", count), &hash_fields(count))
                .await?;
            count += 1;
        }

        Ok(count)
    }
}

/// `RPUSH` onto a list key that rotates every `LIST_ROTATION` pushes.
#[derive(Debug, Clone)]
pub struct ListPush {
    keys: KeySpace,
}

impl ListPush {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for ListPush {
    fn id(&self) -> WorkloadId {
        WorkloadId::ListPush
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            client
                .rpush(&self.keys.key("list", count / LIST_ROTATION), &count.to_string())
                .await?;
            count += 1;
        }

        Ok(count)
    }
}

/// `ZADD` to one sorted set, score = counter.
#[derive(Debug, Clone)]
pub struct SortedSetAdd {
    keys: KeySpace,
}

impl SortedSetAdd {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for SortedSetAdd {
    fn id(&self) -> WorkloadId {
        WorkloadId::SortedSetAdd
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let key = self.keys.fixed("sortedset");
        let mut count = 0u64;

        while !deadline.expired() {
            client
                .zadd(&key, &format!("member_{count}"), count as f64)
                .await?;
            count += 1;
        }

        Ok(count)
    }
}

/// Three related keys written in one `MULTI`/`EXEC`. One commit counts once.
#[derive(Debug, Clone)]
pub struct TransactionalSet {
    keys: KeySpace,
}

impl TransactionalSet {
    pub fn new(keys: KeySpace) -> Self {
        Self { keys }
    }
}

#[async_trait::async_trait]
impl Workload for TransactionalSet {
    fn id(&self) -> WorkloadId {
        WorkloadId::TransactionalSet
    }

    async fn run(&self, client: &dyn KvClient, budget: Duration) -> Result<u64, WorkloadError> {
        let deadline = Deadline::start(budget);
        let mut count = 0u64;

        while !deadline.expired() {
            let tag = self.keys.tag(count);
            let entries = [("a", "value1"), ("b", "value2"), ("c", "value3")]
                .map(|(suffix, value)| (format!("{tag}:{suffix}"), value.to_string()));
            client.transaction_set(&entries).await?;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_shares_one_tag() {
        let workload = ChunkedSet::batch(KeySpace::default());
        let deadline = Deadline::start(Duration::from_secs(60));

        let chunk = workload.next_chunk(1900, &deadline);
        assert_eq!(chunk.len(), CHUNK_SIZE);
        assert_eq!(chunk[0], ("{test:1}:batch:0".to_string(), "1900".to_string()));
        assert_eq!(chunk[99].0, "{test:1}:batch:99");
        assert_eq!(chunk[99].1, "1999");
    }

    #[test]
    fn test_pipeline_partition_span() {
        let workload = ChunkedSet::pipeline(KeySpace::default());
        let deadline = Deadline::start(Duration::from_secs(60));

        let chunk = workload.next_chunk(300, &deadline);
        assert!(chunk.iter().all(|(key, _)| key.starts_with("{test:3}:pipeline:")));
    }

    #[test]
    fn test_expired_deadline_yields_empty_chunk() {
        let workload = ChunkedSet::batch(KeySpace::default());
        let deadline = Deadline::start(Duration::ZERO);
        assert!(workload.next_chunk(0, &deadline).is_empty());
    }

    #[test]
    fn test_hash_fields() {
        assert_eq!(
            hash_fields(5),
            vec![
                ("field1".to_string(), "value1_5".to_string()),
                ("field2".to_string(), "value2_5".to_string()),
                ("field3".to_string(), "value3_5".to_string()),
            ]
        );
    }
}
