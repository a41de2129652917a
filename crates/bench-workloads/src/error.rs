//! Error types for workloads.

use kv_client::ClientError;
use thiserror::Error;

/// Errors that stop a workload.
#[derive(Error, Debug)]
pub enum WorkloadError {
    /// A client operation failed.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// A document or message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
