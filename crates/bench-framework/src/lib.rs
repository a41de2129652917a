//! Benchmark runner for kv-bench.
//!
//! Runs the workload catalog against every configured target in turn and
//! compares their throughput:
//! 1. Open one [`ClusterSession`] per target
//! 2. Run each selected workload through the timed driver
//! 3. Remove the keys the run created
//! 4. Close every session and build a [`Comparison`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bench_framework::{BenchConfig, BenchmarkRunner};
//! use kv_client::RedisConnector;
//!
//! let config = BenchConfig::from_file("kv-bench.yaml")?;
//! let runner = BenchmarkRunner::new(config, Arc::new(RedisConnector));
//! let outcome = runner.run().await?;
//! println!("{}", bench_framework::report::format_table(&outcome.comparison()?));
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod session;

pub use config::BenchConfig;
pub use error::{BenchError, ReportError};
pub use metrics::WorkloadResult;
pub use report::{Comparison, ComparisonRow, Difference, Measurement, Verdict};
pub use runner::{BenchmarkOutcome, BenchmarkRunner};
pub use session::ClusterSession;
