//! Key-value client capability for kv-bench.
//!
//! Workloads never talk to a concrete client library. They receive a
//! `&dyn KvClient`, which is implemented by:
//!
//! - [`RedisClient`]: a Redis-protocol deployment (cluster or standalone),
//!   backed by the `redis` crate.
//! - [`MemoryClient`]: an in-process store used for dry runs and tests.
//!
//! A [`Connector`] turns a [`TargetConfig`] into a live client.

mod config;
mod error;
mod memory;
mod redis_client;
mod subscription;
mod traits;

pub use config::{parse_endpoint, CommandMap, TargetConfig, Topology};
pub use error::{ClientError, Result};
pub use memory::{glob_match, MemoryClient, MemoryConnector};
pub use redis_client::{RedisClient, RedisConnector};
pub use subscription::{ReceivedMessage, Subscription};
pub use traits::{Connector, KvClient, ScanError, ScanOutcome, ServerInfo};
