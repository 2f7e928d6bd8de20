//! Session lifecycle tests against a stub compose executable.
//!
//! The stub records every invocation into `calls.log` next to itself
//! and changes behavior based on marker files, so these tests exercise
//! the real build/run sequencing without a container engine.

#![cfg(unix)]

use eitri_core::compose::{ARG_IMAGE, ARG_PRE_INSTALL, ENTRYPOINT_SERVICE};
use eitri_core::{
    CommandOutcome, Environment, Error, SessionBuilder, SessionRunner, Toolkit, Workspace,
};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STUB_SCRIPT: &str = r#"#!/bin/sh
here="$(cd "$(dirname "$0")" && pwd)"
echo "$@" >> "$here/calls.log"
case "$*" in
  *" build")
    if [ -e "$here/fail-build" ]; then
      echo "stub build error" >&2
      exit 1
    fi
    ;;
  *" run "*)
    if [ -e "$here/run-exit" ]; then
      exit "$(cat "$here/run-exit")"
    fi
    ;;
esac
exit 0
"#;

/// One self-contained fixture: stub compose, toolkit dir, workspace dir.
struct Fixture {
    root: TempDir,
    compose_stub: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let compose_stub = root.path().join("docker-compose");
        fs::write(&compose_stub, STUB_SCRIPT).unwrap();
        let mut perms = fs::metadata(&compose_stub).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&compose_stub, perms).unwrap();

        fs::create_dir(root.path().join("workspace")).unwrap();

        Self { root, compose_stub }
    }

    fn toolkit(&self, compose_yaml: &str) -> Toolkit {
        let dir = self.root.path().join("toolkit");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("docker-compose.yaml"), compose_yaml).unwrap();
        Toolkit::load(dir).unwrap()
    }

    fn workspace(&self) -> Workspace {
        Workspace::load(self.root.path().join("workspace")).unwrap()
    }

    fn environment(&self) -> Environment {
        Environment::new(self.root.path(), "default", &self.compose_stub)
    }

    fn calls(&self) -> Vec<String> {
        match fs::read_to_string(self.root.path().join("calls.log")) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn mark(&self, name: &str, content: &str) {
        fs::write(self.root.path().join(name), content).unwrap();
    }
}

async fn build_runner(fixture: &Fixture) -> SessionRunner {
    let session = SessionBuilder::new(
        fixture.workspace(),
        fixture.toolkit("services:\n  entrypoint:\n    image: base:1.0\n"),
        fixture.environment(),
    )
    .temp_root(fixture.root.path())
    .skip_preload()
    .build()
    .await
    .unwrap();
    SessionRunner::new(session)
}

fn load_mapping(path: &Path) -> Mapping {
    serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn merged_file_carries_workspace_build_args() {
    let fixture = Fixture::new();
    fs::write(
        fixture.root.path().join("workspace/.eitri.yaml"),
        "pre-install: apt-get update\n",
    )
    .unwrap();

    let workspace = fixture.workspace();
    let session = SessionBuilder::new(
        workspace.clone(),
        fixture.toolkit("services:\n  entrypoint:\n    image: base:1.0\n"),
        fixture.environment(),
    )
    .temp_root(fixture.root.path())
    .skip_preload()
    .build()
    .await
    .unwrap();

    let merged = load_mapping(session.compose_path());
    let entrypoint = merged
        .get("services")
        .and_then(Value::as_mapping)
        .unwrap()
        .get(ENTRYPOINT_SERVICE)
        .and_then(Value::as_mapping)
        .unwrap();

    assert!(entrypoint.get("image").is_none());
    let build = entrypoint.get("build").and_then(Value::as_mapping).unwrap();
    assert_eq!(
        build.get("context").and_then(Value::as_str),
        Some(workspace.path().display().to_string().as_str())
    );
    let args = build.get("args").and_then(Value::as_mapping).unwrap();
    assert_eq!(args.get(ARG_IMAGE).and_then(Value::as_str), Some("base:1.0"));
    assert_eq!(
        args.get(ARG_PRE_INSTALL).and_then(Value::as_str),
        Some("apt-get update")
    );

    // The template the merged file references exists alongside it.
    let dockerfile = build.get("dockerfile").and_then(Value::as_str).unwrap();
    assert!(Path::new(dockerfile).exists());
}

#[tokio::test]
async fn invalid_toolkit_allocates_no_temp_dir() {
    let fixture = Fixture::new();
    let temp_root = fixture.root.path().join("sessions");
    fs::create_dir(&temp_root).unwrap();

    let result = SessionBuilder::new(
        fixture.workspace(),
        fixture.toolkit("services:\n  main:\n    image: base:1.0\n"),
        fixture.environment(),
    )
    .temp_root(&temp_root)
    .skip_preload()
    .build()
    .await;

    assert!(matches!(result, Err(Error::InvalidToolkit(_))));
    assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
}

#[tokio::test]
async fn toolkit_without_compose_file_is_invalid() {
    let fixture = Fixture::new();
    let dir = fixture.root.path().join("bare-toolkit");
    fs::create_dir(&dir).unwrap();

    let result = SessionBuilder::new(
        fixture.workspace(),
        Toolkit::load(dir).unwrap(),
        fixture.environment(),
    )
    .skip_preload()
    .build()
    .await;

    assert!(matches!(result, Err(Error::InvalidToolkit(_))));
}

#[tokio::test]
async fn preload_pulls_against_the_original_compose_file() {
    let fixture = Fixture::new();
    let toolkit = fixture.toolkit("services:\n  entrypoint:\n    image: base:1.0\n");
    let toolkit_compose = toolkit.compose_path();

    SessionBuilder::new(fixture.workspace(), toolkit, fixture.environment())
        .temp_root(fixture.root.path())
        .build()
        .await
        .unwrap();

    let calls = fixture.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        format!("-f {} pull", toolkit_compose.display())
    );
}

#[tokio::test]
async fn failed_build_never_reaches_the_run_verb() {
    let fixture = Fixture::new();
    fixture.mark("fail-build", "");
    let mut runner = build_runner(&fixture).await;

    let err = runner.execute("echo hi").await.unwrap_err();
    match err {
        Error::BuildFailure { status, output } => {
            assert_eq!(status, 1);
            assert!(output.contains("stub build error"));
        }
        other => panic!("expected BuildFailure, got {other:?}"),
    }

    let calls = fixture.calls();
    assert!(calls.iter().any(|call| call.ends_with(" build")));
    assert!(!calls.iter().any(|call| call.contains(" run ")));
    // The failed attempt still recorded its duration.
    assert!(runner.build_time().unwrap() > 0.0);
    assert!(runner.run_time().is_none());
}

#[tokio::test]
async fn successful_command_builds_then_runs() {
    let fixture = Fixture::new();
    let mut runner = build_runner(&fixture).await;

    let outcome = runner.execute("echo hi").await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed { exit_code: 0 });

    let calls = fixture.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].ends_with(" build"));
    let run_call = &calls[1];
    assert!(run_call.contains(&format!("run --rm {} /bin/bash -c echo hi", ENTRYPOINT_SERVICE)));

    assert!(runner.build_time().unwrap() > 0.0);
    assert!(runner.run_time().unwrap() > 0.0);
}

#[tokio::test]
async fn user_command_exit_code_is_an_outcome_not_an_error() {
    let fixture = Fixture::new();
    fixture.mark("run-exit", "7");
    let mut runner = build_runner(&fixture).await;

    let outcome = runner.execute("false").await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed { exit_code: 7 });
}

#[tokio::test]
async fn status_line_gains_timings_after_a_command() {
    let fixture = Fixture::new();
    let mut runner = build_runner(&fixture).await;

    let before = runner.status_line();
    assert!(before.contains("default"));
    assert!(before.contains("toolkit: 0.1.0"));
    assert!(!before.contains('('));

    runner.execute("echo hi").await.unwrap();
    let after = runner.status_line();
    assert!(after.contains('('));
    assert!(after.contains(" | "));
}

#[tokio::test]
async fn close_releases_the_session_directory() {
    let fixture = Fixture::new();
    let temp_root = fixture.root.path().join("sessions");
    fs::create_dir(&temp_root).unwrap();

    let session = SessionBuilder::new(
        fixture.workspace(),
        fixture.toolkit("services:\n  entrypoint:\n    image: base:1.0\n"),
        fixture.environment(),
    )
    .temp_root(&temp_root)
    .skip_preload()
    .build()
    .await
    .unwrap();

    assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 1);
    session.close().unwrap();
    assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
}
