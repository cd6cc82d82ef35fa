//! Integration tests for the Refine CLI

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use rf_cli::commands::check::CheckArgs;
use rf_cli::commands::run::RunArgs;
use rf_cli::commands::stage::{Format, StageArgs};
use rf_cli::commands::{check_command, run_command, stage_command};
use rf_cli::config::CliConfig;
use rf_cli::CliError;
use rf_core::ast::build::*;
use rf_core::ast::Expr;
use rf_core::{Constraint, Value};
use rf_interpret::{ImportTable, ImportedBinding};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_program(dir: &Path, name: &str, program: &Expr) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(program).unwrap()).unwrap();
    path
}

fn write_imports(dir: &Path, imports: &ImportTable) -> PathBuf {
    let path = dir.join("imports.json");
    fs::write(&path, serde_json::to_string(imports).unwrap()).unwrap();
    path
}

fn stage_args(input: PathBuf) -> StageArgs {
    StageArgs {
        input,
        imports: None,
        output: None,
        format: None,
    }
}

fn doubled_input() -> Expr {
    let_in("n", runtime(num(4), "n"), mul(var("n"), num(2)))
}

#[test]
fn test_stage_prints_residual_and_constraint() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "double.json", &doubled_input());

    let result = stage_command(stage_args(input), &CliConfig::default()).unwrap();
    assert_eq!(result.output, "n * 2\n// : 8\n");
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_stage_without_constraint_line() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "double.json", &doubled_input());
    let mut config = CliConfig::default();
    config.output.show_constraint = false;

    let result = stage_command(stage_args(input), &config).unwrap();
    assert_eq!(result.output, "n * 2\n");
}

#[test]
fn test_stage_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "sum.json", &add(num(1), num(2)));
    let args = StageArgs {
        format: Some(Format::Json),
        ..stage_args(input)
    };

    let result = stage_command(args, &CliConfig::default()).unwrap();
    let document: serde_json::Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(document["source"], "3");
    assert_eq!(document["value"], "3");
    assert_eq!(document["specializations"], 0);
    let residual: Expr = serde_json::from_value(document["residual"].clone()).unwrap();
    assert_eq!(residual.to_string(), "3");
}

#[test]
fn test_stage_writes_output_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "double.json", &doubled_input());
    let output = temp_dir.path().join("out.txt");
    let args = StageArgs {
        output: Some(output.clone()),
        ..stage_args(input)
    };

    let result = stage_command(args, &CliConfig::default()).unwrap();
    assert!(result.output.is_empty());
    assert!(fs::read_to_string(output).unwrap().starts_with("n * 2"));
}

#[test]
fn test_stage_with_imports() {
    let temp_dir = TempDir::new().unwrap();
    let program = block(
        vec![import_item(&["limit", "n"], "config")],
        add(var("n"), var("limit")),
    );
    let input = write_program(temp_dir.path(), "limit.json", &program);
    let mut imports = ImportTable::new();
    imports
        .insert("config", "limit", ImportedBinding::Value(Value::from(10.0)))
        .insert("config", "n", ImportedBinding::Declared(Constraint::IsNumber));
    let imports = write_imports(temp_dir.path(), &imports);
    let args = StageArgs {
        imports: Some(imports),
        ..stage_args(input)
    };

    let result = stage_command(args, &CliConfig::default()).unwrap();
    assert!(
        result.output.starts_with(r#"{ import { n } from "config"; n + 10 }"#),
        "{}",
        result.output
    );
}

#[test]
fn test_run_prints_value() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "double.json", &doubled_input());
    let args = RunArgs {
        input,
        imports: None,
    };

    let result = run_command(args, &CliConfig::default()).unwrap();
    assert_eq!(result.output, "8\n");
}

#[test]
fn test_staging_errors_surface_as_refine_errors() {
    let temp_dir = TempDir::new().unwrap();
    let program = comptime(runtime(num(1), "a"));
    let input = write_program(temp_dir.path(), "bad.json", &program);

    let err = stage_command(stage_args(input), &CliConfig::default()).unwrap_err();
    assert!(
        matches!(err, CliError::Refine(rf_core::Error::Staging { .. })),
        "{:?}",
        err
    );
}

#[test]
fn test_missing_input_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let args = stage_args(temp_dir.path().join("missing.json"));
    let err = stage_command(args, &CliConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::InvalidInput(_)), "{:?}", err);
}

#[test]
fn test_malformed_ast_is_invalid() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("broken.json");
    fs::write(&input, "{ not json").unwrap();
    let err = stage_command(stage_args(input), &CliConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::InvalidInput(_)), "{:?}", err);
}

#[test]
fn test_check_counts_warnings_and_can_deny_them() {
    let temp_dir = TempDir::new().unwrap();
    let clean = write_program(temp_dir.path(), "clean.json", &doubled_input());
    let noisy = write_program(
        temp_dir.path(),
        "noisy.json",
        &trust(runtime(string("s"), "s"), var("number")),
    );
    let args = CheckArgs {
        inputs: vec![clean.clone(), noisy.clone()],
        imports: None,
        deny_warnings: false,
    };

    let result = check_command(args.clone(), &CliConfig::default()).unwrap();
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.output.contains("clean.json: ok, 0 warning(s)"));
    assert!(result.output.contains("noisy.json: ok, 1 warning(s)"));

    let denied = CheckArgs {
        deny_warnings: true,
        ..args
    };
    assert!(check_command(denied, &CliConfig::default()).is_err());
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("rf").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Refine"));
}

#[test]
fn test_cli_stage_binary() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "double.json", &doubled_input());

    let mut cmd = Command::cargo_bin("rf").unwrap();
    cmd.current_dir(temp_dir.path()).arg("stage").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("n * 2"));
}

#[test]
fn test_cli_reports_failures_with_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(temp_dir.path(), "fail.json", &assert_that(boolean(false)));

    let mut cmd = Command::cargo_bin("rf").unwrap();
    cmd.current_dir(temp_dir.path()).arg("run").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("assertion failed"));
}
