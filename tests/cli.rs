use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "tables": [
    {"name": "CUSTOMERS",
     "columns": [{"name": "CUSTOMER_ID", "data_type": "INTEGER"},
                 {"name": "NAME", "data_type": "VARCHAR", "nullable": true}],
     "primary_keys": ["CUSTOMER_ID"], "row_count": 1200},
    {"name": "SALES",
     "columns": [{"name": "SALE_ID", "data_type": "INTEGER"},
                 {"name": "CUSTOMER_ID", "data_type": "INTEGER"},
                 {"name": "TOTAL", "data_type": "DECIMAL"}],
     "primary_keys": ["SALE_ID"],
     "foreign_keys": [{"columns": ["CUSTOMER_ID"], "referenced_table": "CUSTOMERS",
                       "referenced_columns": ["CUSTOMER_ID"]}],
     "row_count": 50000},
    {"name": "TMP_IMPORT", "is_active": false}
  ],
  "samples": {
    "CUSTOMERS": {"columns": ["CUSTOMER_ID", "NAME"], "rows": [[1, "Ada"], [2, "Grace"]]}
  }
}"#;

fn tf_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tf"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("catalog.json"), CATALOG).unwrap();

    let config_content = format!(
        r#"[catalog]
kind = "json"
path = "{root}/data/catalog.json"
sample_rows = 2

[cache]
snapshot_path = "{root}/data/snapshot.json"
refresh_interval_secs = 0

[embedding]
provider = "disabled"

[context.notes]
SALES = "Totals include tax."
"#,
        root = root.display()
    );

    let config_path = config_dir.join("tf.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_tf(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tf_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("TF_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tf binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_build_writes_snapshot() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_tf(&config, &["build"]);
    assert!(ok, "build failed: {}", stderr);
    assert!(stdout.contains("Snapshot v1"));
    assert!(stdout.contains("tables processed:   3"));
    // The disabled provider embeds nothing.
    assert!(stdout.contains("tables embedded:    0"));
    assert!(stdout.contains("persisted:          yes"));
    assert!(tmp.path().join("data/snapshot.json").exists());
}

#[test]
fn test_search_after_build() {
    let (_tmp, config) = setup_test_env();
    run_tf(&config, &["build"]);

    let (stdout, stderr, ok) = run_tf(&config, &["search", "customers", "--explain"]);
    assert!(ok, "search failed: {}", stderr);
    // Warm start from the persisted snapshot.
    assert!(!stdout.contains("No persisted snapshot"));
    assert!(stdout.starts_with("1. ["));
    assert!(stdout.contains("CUSTOMERS"));
    assert!(stdout.contains("semantic: 0.000"));
    assert!(!stdout.contains("TMP_IMPORT"));
}

#[test]
fn test_search_builds_when_nothing_persisted() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_tf(&config, &["search", "sales totals"]);
    assert!(ok, "search failed: {}", stderr);
    assert!(stdout.contains("No persisted snapshot; running a full build first."));
    assert!(stdout.contains("SALES"));
}

#[test]
fn test_refresh_requires_snapshot() {
    let (_tmp, config) = setup_test_env();

    let (_, stderr, ok) = run_tf(&config, &["refresh"]);
    assert!(!ok);
    assert!(stderr.contains("Run `tf build` first"));

    run_tf(&config, &["build"]);
    let (stdout, stderr, ok) = run_tf(&config, &["refresh"]);
    assert!(ok, "refresh failed: {}", stderr);
    assert!(stdout.contains("Snapshot v2 (StatsOnly)"));
}

#[test]
fn test_refresh_is_persisted() {
    let (tmp, config) = setup_test_env();
    run_tf(&config, &["build"]);

    let catalog_path = tmp.path().join("data/catalog.json");
    fs::write(
        &catalog_path,
        CATALOG.replace(r#""row_count": 50000"#, r#""row_count": 60000"#),
    )
    .unwrap();

    let (stdout, stderr, ok) = run_tf(&config, &["refresh"]);
    assert!(ok, "refresh failed: {}", stderr);
    assert!(stdout.contains("persisted:          yes"));

    // A fresh process sees the refreshed snapshot, not the build.
    let (stdout, _, ok) = run_tf(&config, &["info"]);
    assert!(ok);
    assert!(stdout.contains("Version:     2 (StatsOnly)"));
    assert!(stdout.contains("Total rows:  61200"));

    let (stdout, _, ok) = run_tf(&config, &["context", "SALES"]);
    assert!(ok);
    assert!(stdout.contains("- SALES (60,000 rows):"));
}

#[test]
fn test_info_and_context() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_tf(&config, &["info"]);
    assert!(ok);
    assert!(stdout.contains("No snapshot"));

    run_tf(&config, &["build"]);
    let (stdout, _, ok) = run_tf(&config, &["info"]);
    assert!(ok);
    assert!(stdout.contains("Version:     1 (Full)"));
    assert!(stdout.contains("Tables:      3"));
    assert!(stdout.contains("Active:      2"));

    let (stdout, _, ok) = run_tf(&config, &["context", "SALES"]);
    assert!(ok);
    assert!(stdout.contains("- SALES (50,000 rows):"));
    assert!(stdout.contains("relationships: CUSTOMER_ID → CUSTOMERS"));
    assert!(stdout.contains("note: Totals include tax."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_tf(&tmp.path().join("nope.toml"), &["info"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
