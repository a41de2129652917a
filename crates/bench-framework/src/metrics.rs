//! Per-workload measurements.

use std::time::Duration;

/// Outcome of one workload on one target.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadResult {
    /// Workload display name, the join key across targets.
    pub workload: String,
    /// Operations the workload reported.
    pub operations: u64,
    /// Wall-clock time of the whole run, including any drain phase.
    pub duration: Duration,
}

impl WorkloadResult {
    pub fn new(workload: impl Into<String>, operations: u64, duration: Duration) -> Self {
        Self {
            workload: workload.into(),
            operations,
            duration,
        }
    }

    /// Operations per second, `None` for a zero duration.
    pub fn ops_per_second(&self) -> Option<f64> {
        if self.duration.as_secs_f64() > 0.0 {
            Some(self.operations as f64 / self.duration.as_secs_f64())
        } else {
            None
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_per_second() {
        let result = WorkloadResult::new("Single operation", 3000, Duration::from_millis(1500));
        assert_eq!(result.ops_per_second(), Some(2000.0));
        assert_eq!(result.duration_ms(), 1500);
    }

    #[test]
    fn test_zero_duration_has_no_throughput() {
        let result = WorkloadResult::new("Key Search", 100, Duration::ZERO);
        assert_eq!(result.ops_per_second(), None);
    }
}
