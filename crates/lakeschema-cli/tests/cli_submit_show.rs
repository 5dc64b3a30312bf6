//! Integration tests for the CLI binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("lakeschema"))
}

fn write_sample(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write sample file");
    path
}

fn submit_args(input: &Path, registry: &Path, policy: &str) -> Vec<String> {
    [
        "submit",
        "--input",
        input.to_string_lossy().as_ref(),
        "--registry",
        registry.to_string_lossy().as_ref(),
        "--policy",
        policy,
        "--domain",
        "sales",
        "--environment",
        "prod",
        "--zone",
        "curated",
        "--layer",
        "raw",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

#[test]
fn submit_registers_first_version() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let input = write_sample(
        tmp.path(),
        "orders.json",
        r#"[{"id": "1", "email": "a@example.com"}, {"id": "2", "email": "b@example.com"}]"#,
    );
    let registry = tmp.path().join("registry.json");

    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .success()
        .stdout(contains("Dataset: sales_prod_curated"))
        .stdout(contains("sales_orders_raw"))
        .stdout(contains("RegisteredEntity"))
        .stdout(contains("v1"));

    assert!(registry.exists());
    Ok(())
}

#[test]
fn resubmitting_identical_schema_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let input = write_sample(tmp.path(), "orders.json", r#"[{"id": "1"}]"#);
    let registry = tmp.path().join("registry.json");

    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .success();
    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .success()
        .stdout(contains("NoChange"))
        .stdout(contains("v1"));
    Ok(())
}

#[test]
fn breaking_change_under_strict_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let registry = tmp.path().join("registry.json");

    let first = write_sample(
        tmp.path(),
        "orders.json",
        r#"[{"id": "1", "email": "a@example.com"}]"#,
    );
    cli()
        .args(submit_args(&first, &registry, "strict"))
        .assert()
        .success();

    let narrowed = write_sample(tmp.path(), "orders2.json", r#"[{"id": "1"}]"#);
    let mut args = submit_args(&narrowed, &registry, "strict");
    args.push("--entity".into());
    args.push("orders".into());

    cli()
        .args(args)
        .assert()
        .failure()
        .stderr(contains("REMOVE_COLUMN email"));
    Ok(())
}

#[test]
fn breaking_change_under_auto_creates_v2() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let registry = tmp.path().join("registry.json");

    let first = write_sample(
        tmp.path(),
        "orders.json",
        r#"[{"id": "1", "email": "a@example.com"}]"#,
    );
    cli()
        .args(submit_args(&first, &registry, "auto"))
        .assert()
        .success();

    let narrowed = write_sample(tmp.path(), "orders2.json", r#"[{"id": "1"}]"#);
    let mut args = submit_args(&narrowed, &registry, "auto");
    args.push("--entity".into());
    args.push("orders".into());

    cli()
        .args(args)
        .assert()
        .success()
        .stdout(contains("RegisteredVersion"))
        .stdout(contains("v2"))
        .stdout(contains("breaking: REMOVE_COLUMN email"));
    Ok(())
}

#[test]
fn submit_accepts_jsonl_input() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let input = write_sample(
        tmp.path(),
        "events.jsonl",
        "{\"id\": \"1\"}\n{\"id\": \"2\"}\n",
    );
    let registry = tmp.path().join("registry.json");

    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .success()
        .stdout(contains("sales_events_raw"));
    Ok(())
}

#[test]
fn empty_input_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let input = write_sample(tmp.path(), "empty.json", "[]");
    let registry = tmp.path().join("registry.json");

    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .failure()
        .stderr(contains("No record objects"));
    Ok(())
}

#[test]
fn show_prints_registered_entity() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let input = write_sample(tmp.path(), "orders.json", r#"[{"id": "1"}]"#);
    let registry = tmp.path().join("registry.json");

    cli()
        .args(submit_args(&input, &registry, "strict"))
        .assert()
        .success();

    cli()
        .args([
            "show",
            "--registry",
            registry.to_string_lossy().as_ref(),
            "--entity",
            "sales_orders_raw",
        ])
        .assert()
        .success()
        .stdout(contains("\"current_version\": \"v1\""))
        .stdout(contains("sales_orders_raw_v1"));
    Ok(())
}

#[test]
fn show_unknown_entity_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let registry = tmp.path().join("registry.json");

    cli()
        .args([
            "show",
            "--registry",
            registry.to_string_lossy().as_ref(),
            "--entity",
            "ghost",
        ])
        .assert()
        .failure()
        .stderr(contains("not registered"));
    Ok(())
}
