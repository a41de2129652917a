//! Command-line interface for kv-bench
//!
//! # Usage Examples
//!
//! ## Compare two clusters
//! ```bash
//! kv-bench run \
//!   --target Garnet=192.168.5.152:7002,192.168.5.154:7002,192.168.5.160:7002 \
//!   --target Redis=192.168.5.152:7001,192.168.5.154:7001,192.168.5.160:7001 \
//!   --budget 3s
//! ```
//!
//! ## Configuration file
//! ```bash
//! kv-bench init-config --output kv-bench.yaml
//! kv-bench run --config kv-bench.yaml --format markdown
//! ```
//!
//! ## Catalog
//! ```bash
//! kv-bench list
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kv_bench::{run as commands, BenchOpts};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kv-bench")]
#[command(about = "Compare workload throughput across Redis-protocol clusters")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workload catalog against every target and print a comparison
    Run(BenchOpts),

    /// List the workload catalog in run order
    List,

    /// Write the default configuration file
    InitConfig {
        /// Output file (stdout when omitted)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(opts) => commands::run_benchmark(opts).await,
        Commands::List => {
            print!("{}", commands::list_workloads());
            Ok(())
        }
        Commands::InitConfig { output, force } => commands::init_config(output.as_deref(), force),
    }
}
