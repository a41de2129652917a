//! Timed operation driver.

use std::time::{Duration, Instant};

use bench_workloads::Workload;
use tracing::{debug, info};

use crate::error::BenchError;
use crate::metrics::WorkloadResult;
use crate::session::ClusterSession;

/// Run `workload` once against the session's client and record the result.
///
/// The workload owns its budget loop; this only measures total elapsed time,
/// which may exceed `budget` by the last iteration and any drain phase. No
/// retries: a failure is returned and nothing is recorded.
pub async fn run_workload(
    session: &mut ClusterSession,
    workload: &dyn Workload,
    budget: Duration,
) -> Result<WorkloadResult, BenchError> {
    let client = session.client()?;
    info!("Running: {}...", workload.name());

    let started = Instant::now();
    let operations = workload
        .run(client.as_ref(), budget)
        .await
        .map_err(|source| BenchError::Workload {
            target: session.name().to_string(),
            workload: workload.name().to_string(),
            source,
        })?;
    let result = WorkloadResult::new(workload.name(), operations, started.elapsed());

    debug!(
        "{} on {}: {} ops in {}ms",
        result.workload,
        session.name(),
        result.operations,
        result.duration_ms()
    );
    session.record(result.clone());
    Ok(result)
}
