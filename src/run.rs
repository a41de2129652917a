//! Command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bench_framework::report::{self, Comparison};
use bench_framework::{BenchConfig, BenchmarkRunner};
use bench_workloads::WorkloadId;
use clap::ValueEnum;
use kv_client::{Connector, MemoryConnector, RedisConnector};
use tracing::{info, warn};

use crate::config::resolve_config;
use crate::{BenchOpts, OutputFormat};

/// Run the benchmark and print the comparison to stdout.
pub async fn run_benchmark(opts: BenchOpts) -> anyhow::Result<()> {
    let config = resolve_config(&opts)?;
    info!(
        "Benchmarking {} targets with {} workloads, {}ms each",
        config.targets.len(),
        config.workloads_to_run().len(),
        config.budget_ms
    );

    let connector: Arc<dyn Connector> = if opts.dry_run {
        info!("Dry run: targets are in-memory stores");
        Arc::new(MemoryConnector::new())
    } else {
        Arc::new(RedisConnector)
    };

    let outcome = BenchmarkRunner::new(config, connector)
        .run()
        .await
        .context("Benchmark run failed")?;

    if !outcome.all_completed() {
        warn!("Not every target completed the catalog; see the report for details");
    }

    let comparison = outcome
        .comparison()
        .context("Failed to build the comparison")?;
    println!("{}", render(&comparison, opts.format)?);
    Ok(())
}

pub fn render(comparison: &Comparison, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => report::format_table(comparison),
        OutputFormat::Markdown => report::format_markdown(comparison),
        OutputFormat::Json => {
            report::format_json(comparison).context("Failed to serialize the comparison")?
        }
    })
}

/// The catalog in run order, with what each count measures.
pub fn list_workloads() -> String {
    let mut output = String::new();
    for (index, id) in WorkloadId::ALL.iter().enumerate() {
        let mut notes = Vec::new();
        if !id.is_time_bounded() {
            notes.push("single pass");
        }
        if let Some(note) = id.count_note() {
            notes.push(note);
        }

        let id_name = id
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        let line = format!(
            "{:>2}  {:<20} {:<24} {}",
            index + 1,
            id_name,
            id.display_name(),
            notes.join("; ")
        );
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}

/// Write the default configuration to `output`, or stdout when `None`.
pub fn init_config(output: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let yaml = BenchConfig::default()
        .to_yaml()
        .context("Failed to serialize the default configuration")?;

    match output {
        Some(path) => {
            if path.exists() && !force {
                anyhow::bail!("{path:?} already exists, pass --force to overwrite it");
            }
            std::fs::write(path, yaml)
                .with_context(|| format!("Failed to write configuration to {path:?}"))?;
            info!("Wrote default configuration to {:?}", path);
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
