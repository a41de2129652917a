//! Resolution of the effective benchmark configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file given
//! with `--config`, then command-line flags.

pub mod duration;

use anyhow::Context;
use bench_framework::BenchConfig;
use kv_client::{parse_endpoint, TargetConfig, Topology};

use crate::BenchOpts;

/// Build the configuration for a `run` invocation.
pub fn resolve_config(opts: &BenchOpts) -> anyhow::Result<BenchConfig> {
    let mut config = match &opts.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {path:?}"))?,
        None => BenchConfig::default(),
    };

    if !opts.targets.is_empty() {
        let topology = if opts.standalone {
            Topology::Standalone
        } else {
            Topology::Cluster
        };
        config.targets = opts
            .targets
            .iter()
            .map(|spec| {
                parse_target_spec(spec).map(|target| {
                    target
                        .with_topology(topology)
                        .with_fail_fast(opts.fail_fast)
                        .with_credentials(opts.username.clone(), opts.password.clone())
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
    }

    if let Some(budget) = opts.budget {
        config = config.with_budget(budget);
    }
    if let Some(namespace) = &opts.namespace {
        config = config.with_namespace(namespace);
    }
    if !opts.workloads.is_empty() {
        config = config.with_workloads(opts.workloads.clone());
    }
    if opts.no_cleanup {
        config = config.with_cleanup(false);
    }

    config
        .validate()
        .context("Invalid benchmark configuration")?;
    Ok(config)
}

/// Parse `NAME=HOST:PORT[,HOST:PORT...]`.
pub fn parse_target_spec(spec: &str) -> anyhow::Result<TargetConfig> {
    let (name, endpoints) = spec
        .split_once('=')
        .with_context(|| format!("Invalid target '{spec}', expected NAME=HOST:PORT[,HOST:PORT...]"))?;

    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid target '{spec}': name cannot be empty");
    }

    let endpoints: Vec<String> = endpoints
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(String::from)
        .collect();
    if endpoints.is_empty() {
        anyhow::bail!("Invalid target '{spec}': no endpoints given");
    }
    for endpoint in &endpoints {
        parse_endpoint(endpoint).with_context(|| format!("Invalid target '{spec}'"))?;
    }

    Ok(TargetConfig::new(name, endpoints))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_spec() {
        let target = parse_target_spec("Garnet=192.168.5.152:7002, 192.168.5.154:7002").unwrap();
        assert_eq!(target.name, "Garnet");
        assert_eq!(
            target.endpoints,
            vec!["192.168.5.152:7002".to_string(), "192.168.5.154:7002".to_string()]
        );
    }

    #[test]
    fn test_parse_target_spec_invalid() {
        assert!(parse_target_spec("127.0.0.1:7001").is_err());
        assert!(parse_target_spec("=127.0.0.1:7001").is_err());
        assert!(parse_target_spec("Redis=").is_err());
        assert!(parse_target_spec("Redis=localhost").is_err());
    }
}
