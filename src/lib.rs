//! kv-bench library
//!
//! Compares the throughput of Redis-protocol deployments, typically a Garnet
//! cluster against a Redis cluster, by running the same catalog of
//! time-boxed workloads against each target in turn.
//!
//! The work is split across the workspace crates:
//!
//! - `kv_client` - the `KvClient` capability, backed by the `redis` crate or
//!   by an in-memory store
//! - `bench_workloads` - the fourteen workloads
//! - `bench_framework` - sessions, the timed driver, the runner and the
//!   comparison report
//!
//! This crate holds the command-line surface.
//!
//! # CLI Usage
//!
//! ```bash
//! # Compare two clusters for 3 seconds per workload
//! kv-bench run \
//!   --target Garnet=192.168.5.152:7002,192.168.5.154:7002 \
//!   --target Redis=192.168.5.152:7001,192.168.5.154:7001
//!
//! # Only a few workloads, rendered as markdown
//! kv-bench run --config kv-bench.yaml --workloads single-set,pipelined-set --format markdown
//!
//! # Exercise the whole pipeline without a server
//! kv-bench run --dry-run --budget 200ms
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bench_workloads::WorkloadId;
use clap::{Parser, ValueEnum};

pub mod config;
pub mod run;

/// Options for `kv-bench run`.
#[derive(Parser, Clone, Debug, Default)]
pub struct BenchOpts {
    /// YAML configuration file
    #[arg(long, value_name = "PATH", env = "KV_BENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target as NAME=HOST:PORT[,HOST:PORT...]; repeat once per target, base first
    #[arg(long = "target", value_name = "NAME=ENDPOINTS")]
    pub targets: Vec<String>,

    /// Time budget per workload (e.g. 500ms, 3s, 1m)
    #[arg(long, value_parser = config::duration::parse_duration_arg)]
    pub budget: Option<Duration>,

    /// Hash-tag namespace for test keys and channels
    #[arg(long)]
    pub namespace: Option<String>,

    /// Workloads to run (comma-separated); all when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    pub workloads: Vec<WorkloadId>,

    /// Report format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Keep the test keys after each target
    #[arg(long)]
    pub no_cleanup: bool,

    /// Run against in-memory targets instead of real servers
    #[arg(long)]
    pub dry_run: bool,

    /// Abort when a --target is unreachable at startup
    #[arg(long)]
    pub fail_fast: bool,

    /// Treat every --target as a single standalone server
    #[arg(long)]
    pub standalone: bool,

    /// Username for every --target
    #[arg(long, env = "KV_BENCH_USERNAME")]
    pub username: Option<String>,

    /// Password for every --target
    #[arg(long, env = "KV_BENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// How the comparison is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Markdown,
    Json,
}
