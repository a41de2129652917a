use std::time::{Duration, Instant};

use bench_workloads::pubsub::{CONFIRM_EVERY, CONFIRM_TIMEOUT};
use bench_workloads::{catalog, KeySpace, WorkloadId};
use kv_client::{KvClient, MemoryClient};

const SHORT: Duration = Duration::from_millis(50);

#[tokio::test]
async fn test_zero_budget_runs_nothing() {
    let client = MemoryClient::new("garnet");
    let keys = KeySpace::default();

    for workload in catalog(&keys, &[]) {
        if workload.id() == WorkloadId::KeyScan {
            continue;
        }
        let count = workload.run(&client, Duration::ZERO).await.unwrap();
        assert_eq!(count, 0, "{} ran with a zero budget", workload.name());
    }
    assert!(client.is_empty());
}

#[tokio::test]
async fn test_single_set_count_matches_store() {
    let client = MemoryClient::new("garnet");
    let workload = WorkloadId::SingleSet.build(&KeySpace::default());

    let count = workload.run(&client, SHORT).await.unwrap();
    assert!(count > 0);
    assert_eq!(client.len() as u64, count);
    assert!(client.contains_key("{test}:single:0"));
}

#[tokio::test]
async fn test_batched_set_counts_confirmed_writes() {
    let client = MemoryClient::new("redis");
    let workload = WorkloadId::BatchedSet.build(&KeySpace::default());

    let count = workload.run(&client, SHORT).await.unwrap();
    assert!(count > 0);
    assert_eq!(client.write_count(), count);
    assert!(client.contains_key("{test:0}:batch:0"));
}

#[tokio::test]
async fn test_expiring_keys_carry_ttl() {
    let client = MemoryClient::new("redis");
    let workload = WorkloadId::SetWithExpiry.build(&KeySpace::default());

    workload.run(&client, SHORT).await.unwrap();
    let ttl = client.ttl("{test}:expire:0").unwrap();
    assert!(ttl > Duration::from_secs(290) && ttl <= Duration::from_secs(300));
}

#[tokio::test]
async fn test_transaction_counts_commits() {
    let client = MemoryClient::new("redis");
    let workload = WorkloadId::TransactionalSet.build(&KeySpace::default());

    let count = workload.run(&client, SHORT).await.unwrap();
    assert_eq!(client.write_count(), count);
    assert_eq!(client.len() as u64, count * 3);
    assert!(client.contains_key("{test:0}:c"));
}

#[tokio::test]
async fn test_key_scan_seeds_then_counts() {
    let client = MemoryClient::new("garnet");
    let workload = WorkloadId::KeyScan.build(&KeySpace::default());

    assert_eq!(workload.run(&client, SHORT).await.unwrap(), 0);
    assert!(client.contains_key("{test}:search:dummy:99"));

    let found = workload.run(&client, Duration::ZERO).await.unwrap();
    assert!(found >= 100);
}

#[tokio::test]
async fn test_key_scan_ignores_other_namespaces() {
    let client = MemoryClient::new("garnet");
    client.set("{other}:single:0", "0", None).await.unwrap();

    let workload = WorkloadId::KeyScan.build(&KeySpace::default());
    assert_eq!(workload.run(&client, SHORT).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pubsub_throughput_reports_published() {
    let client = MemoryClient::new("garnet");
    let workload = WorkloadId::PubsubThroughput.build(&KeySpace::default());

    let published = workload.run(&client, SHORT).await.unwrap();
    assert!(published > 0);
}

#[tokio::test]
async fn test_pubsub_latency_reports_received() {
    let client = MemoryClient::new("garnet");
    let workload = WorkloadId::PubsubLatency.build(&KeySpace::default());

    let received = workload.run(&client, SHORT).await.unwrap();
    assert!(received > 0);
}

/// Scheduling allowance on top of the computed upper bounds.
const SLACK: Duration = Duration::from_millis(750);

#[tokio::test]
async fn test_pubsub_throughput_gives_up_on_stalled_subscriber() {
    let client = MemoryClient::new("garnet").with_stalled_subscribers();
    let workload = WorkloadId::PubsubThroughput.build(&KeySpace::default());
    let budget = Duration::from_millis(200);

    let started = Instant::now();
    let published = workload.run(&client, budget).await.unwrap();
    let elapsed = started.elapsed();

    assert!(published > 0);
    // One wait per confirmation point plus the final drain.
    let waits = (published / CONFIRM_EVERY + 1) as u32;
    assert!(elapsed >= CONFIRM_TIMEOUT, "final drain skipped: {elapsed:?}");
    assert!(
        elapsed <= budget + CONFIRM_TIMEOUT * waits + SLACK,
        "stalled for {elapsed:?} after {published} publishes"
    );
}

#[tokio::test]
async fn test_pubsub_latency_gives_up_on_stalled_subscriber() {
    let client = MemoryClient::new("garnet").with_stalled_subscribers();
    let workload = WorkloadId::PubsubLatency.build(&KeySpace::default());
    let budget = Duration::from_millis(200);

    let started = Instant::now();
    let received = workload.run(&client, budget).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(received, 0);
    assert!(elapsed >= CONFIRM_TIMEOUT, "final drain skipped: {elapsed:?}");
    assert!(
        elapsed <= budget + CONFIRM_TIMEOUT + SLACK,
        "stalled for {elapsed:?}"
    );
}

#[tokio::test]
async fn test_workload_error_stops_run() {
    let client = MemoryClient::new("redis").with_fail_after_writes(4);
    let workload = WorkloadId::SingleSet.build(&KeySpace::default());

    let result = workload.run(&client, Duration::from_secs(5)).await;
    assert!(result.is_err());
    assert_eq!(client.write_count(), 4);
}

#[test]
fn test_catalog_order_and_selection() {
    let keys = KeySpace::default();

    let all: Vec<_> = catalog(&keys, &[]).iter().map(|w| w.id()).collect();
    assert_eq!(all, WorkloadId::ALL.to_vec());

    let picked: Vec<_> = catalog(
        &keys,
        &[WorkloadId::PubsubLatency, WorkloadId::SingleSet, WorkloadId::SingleSet],
    )
    .iter()
    .map(|w| w.name())
    .collect();
    assert_eq!(picked, vec!["Single operation", "Pub/Sub Latency"]);
}
