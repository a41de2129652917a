//! Benchmark configuration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use bench_workloads::{KeySpace, Workload, WorkloadId};
use kv_client::{parse_endpoint, TargetConfig};
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Configuration for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Time budget per workload, in milliseconds.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// Hash-tag namespace for every key and channel.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Workloads to run (empty = whole catalog).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workloads: Vec<WorkloadId>,
    /// Remove the run's keys after each target.
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
    /// Targets in run order. The first one is the comparison base.
    pub targets: Vec<TargetConfig>,
}

fn default_budget_ms() -> u64 {
    3000
}

fn default_namespace() -> String {
    "test".to_string()
}

fn default_cleanup() -> bool {
    true
}

impl BenchConfig {
    /// Create a configuration with default settings for the given targets.
    pub fn new(targets: Vec<TargetConfig>) -> Self {
        Self {
            budget_ms: default_budget_ms(),
            namespace: default_namespace(),
            workloads: Vec::new(),
            cleanup: default_cleanup(),
            targets,
        }
    }

    /// Set the per-workload budget.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget_ms = budget.as_millis() as u64;
        self
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Restrict the run to specific workloads.
    pub fn with_workloads(mut self, workloads: Vec<WorkloadId>) -> Self {
        self.workloads = workloads;
        self
    }

    /// Enable or disable cleanup.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Replace the target list.
    pub fn with_targets(mut self, targets: Vec<TargetConfig>) -> Self {
        self.targets = targets;
        self
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(&self.namespace)
    }

    /// Get the workloads to run, in catalog order (all if none specified).
    pub fn workloads_to_run(&self) -> Vec<WorkloadId> {
        WorkloadId::ALL
            .into_iter()
            .filter(|id| self.workloads.is_empty() || self.workloads.contains(id))
            .collect()
    }

    /// Build the selected workloads.
    pub fn catalog(&self) -> Vec<Box<dyn Workload>> {
        bench_workloads::catalog(&self.key_space(), &self.workloads)
    }

    /// Check the configuration before any connection is made.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.targets.len() < 2 {
            return Err(BenchError::Config(format!(
                "at least two targets are required, got {}",
                self.targets.len()
            )));
        }

        if self.namespace.is_empty()
            || self
                .namespace
                .contains(|c: char| matches!(c, '{' | '}' | '*' | '?' | '[' | ']') || c.is_whitespace())
        {
            return Err(BenchError::Config(format!(
                "invalid key namespace '{}'",
                self.namespace
            )));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(BenchError::Config("target name cannot be empty".to_string()));
            }
            if !names.insert(target.name.as_str()) {
                return Err(BenchError::Config(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
            if target.endpoints.is_empty() {
                return Err(BenchError::Config(format!(
                    "target '{}' has no endpoints",
                    target.name
                )));
            }
            for endpoint in &target.endpoints {
                parse_endpoint(endpoint)
                    .map_err(|e| BenchError::Config(format!("target '{}': {e}", target.name)))?;
            }
        }

        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, BenchError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, BenchError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for BenchConfig {
    /// A local Garnet cluster compared against a local Redis cluster.
    fn default() -> Self {
        Self::new(vec![
            TargetConfig::new("Garnet", vec!["127.0.0.1:7002".to_string()]),
            TargetConfig::new("Redis", vec!["127.0.0.1:7001".to_string()]),
        ])
    }
}
