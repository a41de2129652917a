//! Workload catalog for kv-bench.
//!
//! Each workload repeatedly issues one access pattern against a
//! [`kv_client::KvClient`] until its time budget runs out and reports how
//! many operations it completed. The catalog order below is the order in
//! which workloads run and appear in reports.
//!
//! | Id                  | Operation per iteration                  |
//! |---------------------|------------------------------------------|
//! | `single-set`        | `SET {ns}:single:n`                      |
//! | `batched-set`       | 100 pipelined `SET`s in one slot         |
//! | `large-value-set`   | `SET` of a 10 KiB value                  |
//! | `hash-set`          | `HSET` with three fields                 |
//! | `list-push`         | `RPUSH`, list rotates every 100 pushes   |
//! | `sorted-set-add`    | `ZADD` to one sorted set                 |
//! | `transactional-set` | `MULTI`/`EXEC` of three related keys     |
//! | `mixed-read-write`  | `SET` key n, `GET` key n-1               |
//! | `set-with-expiry`   | `SET ... PX 300000`                      |
//! | `json-document-set` | `SET` of a serialized nested document    |
//! | `pipelined-set`     | 100 pipelined `SET`s in one slot         |
//! | `key-scan`          | one `SCAN` pass over every endpoint      |
//! | `pubsub-throughput` | `PUBLISH` with periodic receipt checks   |
//! | `pubsub-latency`    | `PUBLISH` timestamped probes             |

pub mod error;
pub mod pubsub;
pub mod scan;
pub mod strings;
pub mod structures;
pub mod workload;

pub use error::WorkloadError;
pub use pubsub::{Envelope, LatencyStats, PubSubLatency, PubSubThroughput};
pub use scan::KeyScan;
pub use strings::{JsonDocumentSet, MixedReadWrite, StringWrite};
pub use structures::{ChunkedSet, HashWrite, ListPush, SortedSetAdd, TransactionalSet};
pub use workload::{Deadline, KeySpace, Workload, WorkloadId};

/// Build the selected workloads in catalog order.
///
/// An empty selection means every workload. Duplicates are ignored.
pub fn catalog(keys: &KeySpace, selection: &[WorkloadId]) -> Vec<Box<dyn Workload>> {
    WorkloadId::ALL
        .into_iter()
        .filter(|id| selection.is_empty() || selection.contains(id))
        .map(|id| id.build(keys))
        .collect()
}
