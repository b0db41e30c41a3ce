// tests/command_actions.rs

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use taskgraph::cli::CliArgs;
use taskgraph::exec::{ShellCommand, TokioPool};
use taskgraph::{run, run_config};
use taskgraph_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use taskgraph_test_utils::init_tracing;

fn append_cmd(out: &Path, line: &str) -> String {
    format!("echo {line} >> '{}'", out.display())
}

fn cli_args(config: &Path) -> CliArgs {
    CliArgs {
        config: config.display().to_string(),
        workers: Some(2),
        poll_interval_ms: Some(20),
        log_level: None,
        dry_run: false,
    }
}

#[test]
fn shell_command_maps_exit_status() {
    init_tracing();
    assert!(ShellCommand::new("ok", "true").run().is_ok());

    let err = ShellCommand::new("bad", "exit 3").run().unwrap_err();
    assert!(err.to_string().contains("code 3"), "unexpected error: {err}");
}

#[test]
fn config_chain_runs_commands_in_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let cfg = ConfigFileBuilder::new()
        .with_workers(4)
        .with_poll_interval_ms(20)
        .with_task("c", TaskConfigBuilder::new(&append_cmd(&out, "c")).after("b").build())
        .with_task("a", TaskConfigBuilder::new(&append_cmd(&out, "a")).build())
        .with_task("b", TaskConfigBuilder::new(&append_cmd(&out, "b")).after("a").build())
        .build();

    let pool = TokioPool::new(cfg.config.effective_workers()).unwrap();
    let failures = run_config(&cfg, Arc::new(pool)).unwrap();

    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
}

#[test]
fn failing_command_does_not_block_its_dependents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let cfg = ConfigFileBuilder::new()
        .with_task("broken", TaskConfigBuilder::new("exit 1").build())
        .with_task(
            "after_broken",
            TaskConfigBuilder::new(&append_cmd(&out, "ran")).after("broken").build(),
        )
        .build();

    let pool = TokioPool::new(2).unwrap();
    let failures = run_config(&cfg, Arc::new(pool)).unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task, "broken");
    assert_eq!(fs::read_to_string(&out).unwrap(), "ran\n");
}

#[test]
fn run_reports_task_failures_as_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Taskgraph.toml");
    fs::write(
        &config,
        r#"
[task.good]
cmd = "true"

[task.bad]
cmd = "false"
after = ["good"]
"#,
    )
    .unwrap();

    let err = run(cli_args(&config)).unwrap_err();
    assert!(err.to_string().contains("1 task(s) failed: bad"), "unexpected error: {err}");
}

#[test]
fn dry_run_executes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let config = dir.path().join("Taskgraph.toml");
    fs::write(
        &config,
        format!("[task.write]\ncmd = \"{}\"\n", append_cmd(&out, "x")),
    )
    .unwrap();

    let mut args = cli_args(&config);
    args.dry_run = true;
    run(args).unwrap();

    assert!(!out.exists());

    // Without --dry-run the same config does run.
    run(cli_args(&config)).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), "x\n");
}

#[test]
fn zero_worker_override_is_rejected() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Taskgraph.toml");
    fs::write(&config, "[task.a]\ncmd = \"true\"\n").unwrap();

    let mut args = cli_args(&config);
    args.workers = Some(0);

    let err = run(args).unwrap_err();
    assert!(err.to_string().contains("--workers"), "unexpected error: {err}");
}
