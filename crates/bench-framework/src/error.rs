//! Error types for the benchmark runner.

use bench_workloads::WorkloadError;
use kv_client::ClientError;
use thiserror::Error;

/// Errors that can occur while running a benchmark.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A target could not be reached with fail-fast enabled. Fatal for the run.
    #[error("Failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: ClientError,
    },

    /// A workload failed. Aborts the rest of that target's catalog only.
    #[error("{workload} failed on {target}: {source}")]
    Workload {
        target: String,
        workload: String,
        #[source]
        source: WorkloadError,
    },

    /// The session has no open client.
    #[error("Session {0} is not open")]
    NotOpen(String),

    /// Comparison could not be built.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed or written.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while joining session results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// A workload present in every session had no result in one of them.
    #[error("No result for {workload} on {target}")]
    MissingResult { target: String, workload: String },

    /// A comparison needs a base and at least one other target.
    #[error("At least two targets are required for a comparison, got {0}")]
    NotEnoughTargets(usize),
}
