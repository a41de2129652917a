//! Error types for key-value clients.

use thiserror::Error;

/// Errors returned by a [`crate::KvClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// Error reported by the Redis client library or the server.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The target was unreachable when the client was opened.
    #[error("Not connected to {target}: {reason}")]
    NotConnected { target: String, reason: String },

    /// The command was disabled through the target's command map.
    #[error("Command {0} is disabled by the command map")]
    CommandDisabled(String),

    /// Admin commands are not allowed for this target.
    #[error("Admin commands are not allowed for target {0}")]
    AdminDisabled(String),

    /// An endpoint could not be parsed as `host:port`.
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The subscription task failed or ended unexpectedly.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Failure injected by the in-memory client.
    #[error("Injected failure: {0}")]
    Injected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
