//! Benchmark runner orchestration.

use std::sync::Arc;

use kv_client::Connector;
use tracing::{error, info};

use crate::config::BenchConfig;
use crate::driver;
use crate::error::{BenchError, ReportError};
use crate::report::Comparison;
use crate::session::ClusterSession;

/// Runs the configured catalog against every target, one target at a time.
pub struct BenchmarkRunner {
    config: BenchConfig,
    connector: Arc<dyn Connector>,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run the benchmark.
    ///
    /// A connection error is fatal. A workload error stops only the failing
    /// target's catalog; the remaining targets still run. Every session is
    /// closed before this returns, whatever the outcome.
    pub async fn run(&self) -> Result<BenchmarkOutcome, BenchError> {
        self.config.validate()?;

        let mut sessions: Vec<ClusterSession> = self
            .config
            .targets
            .iter()
            .cloned()
            .map(ClusterSession::new)
            .collect();

        let result = self.run_sessions(&mut sessions).await;

        for session in &mut sessions {
            session.close().await;
        }

        result.map(|()| BenchmarkOutcome { sessions })
    }

    async fn run_sessions(&self, sessions: &mut [ClusterSession]) -> Result<(), BenchError> {
        for session in sessions.iter_mut() {
            session.open(self.connector.as_ref()).await?;
        }

        let keys = self.config.key_space();
        let workloads = self.config.catalog();
        let budget = self.config.budget();

        for session in sessions.iter_mut() {
            info!("{} cluster performance test starting...", session.name());

            for workload in &workloads {
                if let Err(e) = driver::run_workload(session, workload.as_ref(), budget).await {
                    error!("Error occurred: {}", e);
                    session.mark_failed(e.to_string());
                    break;
                }
            }

            if self.config.cleanup {
                let removed = session.cleanup(&keys).await;
                info!("Cleaned up {} keys on {}", removed, session.name());
            }
        }

        Ok(())
    }
}

/// Closed sessions with their results, in target order.
#[derive(Debug)]
pub struct BenchmarkOutcome {
    pub sessions: Vec<ClusterSession>,
}

impl BenchmarkOutcome {
    /// Compare every target against the first.
    pub fn comparison(&self) -> Result<Comparison, ReportError> {
        Comparison::from_sessions(&self.sessions)
    }

    /// True if every target ran its whole catalog.
    pub fn all_completed(&self) -> bool {
        self.sessions.iter().all(|s| s.failure().is_none())
    }
}
