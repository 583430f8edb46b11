//! Integration tests for top-level CLI behavior.

use std::path::Path;
use std::process::{Command, Output};

fn run_couchmodel(args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_couchmodel");
    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to run couchmodel binary")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn uuid_prints_requested_number_of_ids() {
    let output = run_couchmodel(&["uuid", "--count", "3", "--algorithm", "utc_random"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<&str> = stdout.lines().collect();
    assert_eq!(ids.len(), 3);
    assert!(ids
        .iter()
        .all(|id| id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn uuid_rejects_out_of_range_count_and_unknown_algorithm() {
    let output = run_couchmodel(&["uuid", "--count", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("positive"));

    for count in ["1001", "18446744073709551615"] {
        let output = run_couchmodel(&["uuid", "--count", count]);
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("exceeds the limit"), "{stderr}");
        assert!(!stderr.contains("panicked"));
    }

    let output = run_couchmodel(&["uuid", "--algorithm", "bogus"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown algorithm"));
}

#[test]
fn generated_view_is_published_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let models = dir.path().join("models");
    let config = dir.path().join("couchmodel.yml");
    std::fs::write(
        &config,
        "test:\n  database: db/test.sqlite3\n  design_documents_paths:\n    - models\n",
    )
    .expect("write settings");

    let output = run_couchmodel(&[
        "generate",
        "view",
        "BlogPost",
        "by_title",
        "--root",
        path_arg(&models),
    ]);
    assert!(output.status.success());
    assert!(models.join("blog_post/by_title/map.js").is_file());
    assert!(models.join("blog_post/by_title/reduce.js").is_file());

    let sync = [
        "sync",
        "--config",
        path_arg(&config),
        "--env",
        "test",
        "--model",
        "BlogPost",
        "--view",
        "by_title",
    ];
    let first = run_couchmodel(&sync);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(String::from_utf8_lossy(&first.stdout).contains("blog_post: published"));
    assert!(dir.path().join("db/test.sqlite3").is_file());

    let second = run_couchmodel(&sync);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stdout).contains("blog_post: up_to_date"));
}

#[test]
fn generate_config_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output_path = dir.path().join("config/couchmodel.yml");
    let args = [
        "generate",
        "config",
        "--bucket",
        "blog",
        "--output",
        path_arg(&output_path),
    ];

    assert!(run_couchmodel(&args).status.success());
    let written = std::fs::read_to_string(&output_path).expect("settings written");
    assert!(written.contains("bucket: blog_production"));

    let again = run_couchmodel(&args);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));
}

#[test]
fn disabled_environment_skips_sync() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("couchmodel.yml");
    std::fs::write(
        &config,
        "production:\n  ensure_design_documents: false\n  design_documents_paths: [models]\n",
    )
    .expect("write settings");

    let output = run_couchmodel(&[
        "sync",
        "--config",
        path_arg(&config),
        "--env",
        "production",
        "--model",
        "Post",
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("disabled"));
}
