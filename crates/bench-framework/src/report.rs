//! Cross-target comparison and report rendering.

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;

use crate::error::ReportError;
use crate::session::ClusterSession;

/// Throughput of every target, joined by workload name.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    /// Target names in run order. The first is the base.
    pub targets: Vec<String>,
    /// One row per workload with a result on every target, in base order.
    pub rows: Vec<ComparisonRow>,
    /// Workloads that some targets never completed.
    pub incomplete: Vec<IncompleteWorkload>,
    /// Targets whose catalog stopped early.
    pub failures: Vec<TargetFailure>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub workload: String,
    /// One per target, in target order.
    pub measurements: Vec<Measurement>,
    /// One per non-base target.
    pub differences: Vec<Difference>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub target: String,
    pub operations: u64,
    pub duration_ms: u64,
    /// `None` when the duration was zero.
    pub ops_per_second: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    pub base: String,
    pub other: String,
    pub verdict: Verdict,
}

/// Outcome of comparing two throughputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// `target` is `percent` faster, relative to the base throughput.
    Faster { target: String, percent: f64 },
    Equal,
    /// The base throughput was zero or unknown.
    Undefined,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Faster { target, percent } => {
                write!(f, "{target} is {}% faster", format_percent(*percent))
            }
            Verdict::Equal => write!(f, "no difference"),
            Verdict::Undefined => write!(f, "undefined (no base throughput)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteWorkload {
    pub workload: String,
    pub missing_from: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    pub target: String,
    pub reason: String,
}

/// Compare `other` against `base` as `((other / base) - 1) * 100`, labelled
/// with the faster side. Only identical throughputs are `Equal`.
pub fn compare_throughput(
    base_name: &str,
    base: Option<f64>,
    other_name: &str,
    other: Option<f64>,
) -> Verdict {
    let (Some(base), Some(other)) = (base, other) else {
        return Verdict::Undefined;
    };
    if base <= 0.0 {
        return Verdict::Undefined;
    }

    let diff = (other / base - 1.0) * 100.0;
    if !diff.is_finite() {
        Verdict::Undefined
    } else if diff == 0.0 {
        Verdict::Equal
    } else if diff > 0.0 {
        Verdict::Faster {
            target: other_name.to_string(),
            percent: diff,
        }
    } else {
        Verdict::Faster {
            target: base_name.to_string(),
            percent: -diff,
        }
    }
}

impl Comparison {
    /// Join the results of `sessions`, using the first as the base.
    pub fn from_sessions(sessions: &[ClusterSession]) -> Result<Self, ReportError> {
        let [base, others @ ..] = sessions else {
            return Err(ReportError::NotEnoughTargets(0));
        };
        if others.is_empty() {
            return Err(ReportError::NotEnoughTargets(1));
        }

        let mut rows = Vec::new();
        let mut incomplete = Vec::new();

        for result in base.results() {
            let missing_from: Vec<String> = others
                .iter()
                .filter(|s| s.result(&result.workload).is_none())
                .map(|s| s.name().to_string())
                .collect();
            if !missing_from.is_empty() {
                incomplete.push(IncompleteWorkload {
                    workload: result.workload.clone(),
                    missing_from,
                });
                continue;
            }

            let measurements = sessions
                .iter()
                .map(|session| measure(session, &result.workload))
                .collect::<Result<Vec<_>, _>>()?;

            let differences = measurements[1..]
                .iter()
                .map(|other| Difference {
                    base: measurements[0].target.clone(),
                    other: other.target.clone(),
                    verdict: compare_throughput(
                        &measurements[0].target,
                        measurements[0].ops_per_second,
                        &other.target,
                        other.ops_per_second,
                    ),
                })
                .collect();

            rows.push(ComparisonRow {
                workload: result.workload.clone(),
                measurements,
                differences,
            });
        }

        // Workloads the base never completed.
        for session in others {
            for result in session.results() {
                if base.result(&result.workload).is_some()
                    || incomplete.iter().any(|i| i.workload == result.workload)
                {
                    continue;
                }
                incomplete.push(IncompleteWorkload {
                    workload: result.workload.clone(),
                    missing_from: sessions
                        .iter()
                        .filter(|s| s.result(&result.workload).is_none())
                        .map(|s| s.name().to_string())
                        .collect(),
                });
            }
        }

        let failures = sessions
            .iter()
            .filter_map(|s| {
                s.failure().map(|reason| TargetFailure {
                    target: s.name().to_string(),
                    reason: reason.to_string(),
                })
            })
            .collect();

        Ok(Self {
            targets: sessions.iter().map(|s| s.name().to_string()).collect(),
            rows,
            incomplete,
            failures,
            generated_at: Utc::now(),
        })
    }

    pub fn row(&self, workload: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.workload == workload)
    }
}

fn measure(session: &ClusterSession, workload: &str) -> Result<Measurement, ReportError> {
    let result = session
        .result(workload)
        .ok_or_else(|| ReportError::MissingResult {
            target: session.name().to_string(),
            workload: workload.to_string(),
        })?;
    Ok(Measurement {
        target: session.name().to_string(),
        operations: result.operations,
        duration_ms: result.duration_ms(),
        ops_per_second: result.ops_per_second(),
    })
}

/// Label for one difference. Two-target runs omit the pairing.
fn difference_label(comparison: &Comparison, row: &ComparisonRow, diff: &Difference) -> String {
    if comparison.targets.len() > 2 {
        format!("{} ({} vs {})", row.workload, diff.other, diff.base)
    } else {
        row.workload.clone()
    }
}

/// Render the comparison as console tables.
pub fn format_table(comparison: &Comparison) -> String {
    let mut output = String::new();

    output.push_str("\nPerformance Test Results Comparison:\n");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut header = vec![Cell::new("Test Type")];
    header.extend(
        comparison
            .targets
            .iter()
            .map(|t| Cell::new(format!("{t} (ops/sec)"))),
    );
    table.set_header(header);

    for row in &comparison.rows {
        let mut cells = vec![Cell::new(&row.workload)];
        cells.extend(
            row.measurements
                .iter()
                .map(|m| Cell::new(format_ops(m.ops_per_second))),
        );
        table.add_row(cells);
    }
    output.push_str(&table.to_string());
    output.push('\n');

    output.push_str("\nPerformance Difference Analysis:\n");
    for row in &comparison.rows {
        for diff in &row.differences {
            output.push_str(&format!(
                "{}: {}\n",
                difference_label(comparison, row, diff),
                diff.verdict
            ));
        }
    }

    if !comparison.incomplete.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Incomplete Workload", "Missing From"]);
        for item in &comparison.incomplete {
            table.add_row(vec![
                Cell::new(&item.workload).fg(Color::Yellow),
                Cell::new(item.missing_from.join(", ")),
            ]);
        }
        output.push('\n');
        output.push_str(&table.to_string());
        output.push('\n');
    }

    if !comparison.failures.is_empty() {
        output.push_str("\nFailed Targets:\n");
        for failure in &comparison.failures {
            output.push_str(&format!("  {}: {}\n", failure.target, failure.reason));
        }
    }

    output
}

/// Render the comparison as markdown.
pub fn format_markdown(comparison: &Comparison) -> String {
    let mut output = String::new();

    output.push_str("# Performance Test Results\n\n");
    output.push_str(&format!(
        "**Generated at:** {}\n\n",
        comparison.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str("## Throughput\n\n");
    output.push_str("| Test Type |");
    for target in &comparison.targets {
        output.push_str(&format!(" {target} (ops/sec) |"));
    }
    output.push_str("\n|-----------|");
    for _ in &comparison.targets {
        output.push_str("------|");
    }
    output.push('\n');

    for row in &comparison.rows {
        output.push_str(&format!("| {} |", row.workload));
        for m in &row.measurements {
            output.push_str(&format!(" {} |", format_ops(m.ops_per_second)));
        }
        output.push('\n');
    }

    output.push_str("\n## Difference Analysis\n\n");
    for row in &comparison.rows {
        for diff in &row.differences {
            output.push_str(&format!(
                "- **{}:** {}\n",
                difference_label(comparison, row, diff),
                diff.verdict
            ));
        }
    }

    if !comparison.incomplete.is_empty() {
        output.push_str("\n## Incomplete Workloads\n\n");
        for item in &comparison.incomplete {
            output.push_str(&format!(
                "- **{}:** missing from {}\n",
                item.workload,
                item.missing_from.join(", ")
            ));
        }
    }

    if !comparison.failures.is_empty() {
        output.push_str("\n## Failed Targets\n\n");
        for failure in &comparison.failures {
            output.push_str(&format!("- **{}:** {}\n", failure.target, failure.reason));
        }
    }

    output
}

/// Render the comparison as pretty-printed JSON.
pub fn format_json(comparison: &Comparison) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(comparison)
}

fn format_ops(ops_per_second: Option<f64>) -> String {
    ops_per_second
        .map(|ops| format_number(ops.round() as u64))
        .unwrap_or_else(|| "-".to_string())
}

/// Format a percentage with one decimal and thousands separators.
fn format_percent(percent: f64) -> String {
    let tenths = (percent * 10.0).round() as u64;
    format!("{}.{}", format_number(tenths / 10), tenths % 10)
}

/// Format number with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
