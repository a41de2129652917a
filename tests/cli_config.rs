use std::io::Write;
use std::time::Duration;

use bench_workloads::WorkloadId;
use clap::Parser;
use kv_bench::config::resolve_config;
use kv_bench::{run, BenchOpts, OutputFormat};
use kv_client::Topology;

fn parse(args: &[&str]) -> BenchOpts {
    let mut argv = vec!["kv-bench"];
    argv.extend_from_slice(args);
    BenchOpts::try_parse_from(argv).unwrap()
}

#[test]
fn test_defaults_compare_local_garnet_and_redis() {
    let config = resolve_config(&parse(&[])).unwrap();

    assert_eq!(config.budget(), Duration::from_secs(3));
    assert_eq!(config.namespace, "test");
    assert!(config.cleanup);
    let names: Vec<_> = config.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Garnet", "Redis"]);
}

#[test]
fn test_flags_override_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
budget_ms: 10000
namespace: filebench
cleanup: true
targets:
  - name: Garnet
    endpoints: ["10.0.0.1:7002"]
  - name: Redis
    endpoints: ["10.0.0.1:7001"]
    allow_admin: false
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap();
    let opts = parse(&[
        "--config",
        path,
        "--budget",
        "500ms",
        "--workloads",
        "key-scan,single-set",
        "--no-cleanup",
    ]);
    let config = resolve_config(&opts).unwrap();

    assert_eq!(config.budget_ms, 500);
    assert_eq!(config.namespace, "filebench");
    assert!(!config.cleanup);
    assert_eq!(
        config.workloads_to_run(),
        vec![WorkloadId::SingleSet, WorkloadId::KeyScan]
    );
    assert!(!config.targets[1].allow_admin);
}

#[test]
fn test_cli_targets_replace_file_targets() {
    let opts = parse(&[
        "--target",
        "A=10.0.0.1:7002,10.0.0.2:7002",
        "--target",
        "B=10.0.0.1:6379",
        "--standalone",
        "--fail-fast",
        "--password",
        "secret",
    ]);
    let config = resolve_config(&opts).unwrap();

    assert_eq!(config.targets.len(), 2);
    assert_eq!(config.targets[0].endpoints.len(), 2);
    assert!(config
        .targets
        .iter()
        .all(|t| t.topology == Topology::Standalone && t.fail_fast));
    assert_eq!(config.targets[1].password.as_deref(), Some("secret"));
}

#[test]
fn test_single_target_is_rejected() {
    let err = resolve_config(&parse(&["--target", "A=10.0.0.1:7002"])).unwrap_err();
    assert!(format!("{err:#}").contains("at least two targets"));
}

#[test]
fn test_invalid_arguments() {
    assert!(BenchOpts::try_parse_from(["kv-bench", "--budget", "soon"]).is_err());
    assert!(BenchOpts::try_parse_from(["kv-bench", "--workloads", "flushall"]).is_err());
    assert!(resolve_config(&parse(&["--config", "/nonexistent/kv-bench.yaml"])).is_err());
}

#[test]
fn test_init_config_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kv-bench.yaml");

    run::init_config(Some(&path), false).unwrap();
    assert!(run::init_config(Some(&path), false).is_err());
    run::init_config(Some(&path), true).unwrap();

    let opts = parse(&["--config", path.to_str().unwrap()]);
    let config = resolve_config(&opts).unwrap();
    assert_eq!(config.targets[0].endpoints, vec!["127.0.0.1:7002".to_string()]);
}

#[test]
fn test_list_marks_single_pass_and_counts() {
    let listing = run::list_workloads();
    let lines: Vec<_> = listing.lines().collect();

    assert_eq!(lines.len(), 14);
    assert!(lines[0].contains("single-set") && lines[0].contains("Single operation"));
    assert!(lines[11].contains("Key Search") && lines[11].contains("single pass"));
    assert!(lines[12].ends_with("messages published"));
    assert!(lines[13].ends_with("messages received"));
}

#[test]
fn test_dry_run_renders_every_format() {
    for format in ["table", "markdown", "json"] {
        let opts = parse(&[
            "--dry-run",
            "--budget",
            "5ms",
            "--workloads",
            "single-set,hash-set",
            "--format",
            format,
        ]);
        tokio_test::block_on(run::run_benchmark(opts)).unwrap();
    }
}

#[tokio::test]
async fn test_render_json_has_rows() {
    use bench_framework::BenchmarkRunner;
    use kv_client::MemoryConnector;
    use std::sync::Arc;

    let config = resolve_config(&parse(&["--budget", "5ms", "--workloads", "list-push"])).unwrap();
    let outcome = BenchmarkRunner::new(config, Arc::new(MemoryConnector::new()))
        .run()
        .await
        .unwrap();
    let comparison = outcome.comparison().unwrap();

    let json = run::render(&comparison, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["targets"][0], "Garnet");
    assert_eq!(value["rows"][0]["workload"], "List operation");
}
