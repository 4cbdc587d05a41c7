//! CLI exit status against a stand-in gcloud.
//!
//! `GCLOUD_BIN` points the binary at a script that prints the fixture
//! manifest (or fails), so no credentials are needed.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/service.yaml")
}

fn fake_gcloud(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("gcloud");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn deploy_verify(gcloud: &Path, vars: &[(&str, &str)]) -> Option<i32> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_deploy-verify"));
    command
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("GCLOUD_BIN", gcloud)
        .env("PROJECT_ID", "example-proj")
        .env("SERVICE", "hello");
    for (key, value) in vars {
        command.env(key, value);
    }
    command.output().expect("deploy-verify should run").status.code()
}

/// Scenarios share one test so scripts are never written while another
/// test is spawning processes.
#[test]
fn test_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let describe = fake_gcloud(
        dir.path(),
        &format!("cat '{}'", fixture_path().display()),
    );

    assert_eq!(
        deploy_verify(&describe, &[("ENV", "FOO=bar"), ("REVISION", "hello-00004-vex")]),
        Some(0),
        "matching expectations should exit 0"
    );

    assert_eq!(
        deploy_verify(&describe, &[("ENV", "FOO=baz")]),
        Some(1),
        "a mismatch should exit 1"
    );

    assert_eq!(
        deploy_verify(&describe, &[("PARAMS", "{not json")]),
        Some(1),
        "an invalid expectation should exit 1"
    );

    let missing_dir = tempfile::tempdir().unwrap();
    let missing = fake_gcloud(
        missing_dir.path(),
        "echo 'ERROR: (gcloud.run.services.describe) Cannot find service [hello]' >&2\nexit 1",
    );
    assert_eq!(
        deploy_verify(&missing, &[("ENV", "FOO=bar")]),
        Some(2),
        "an undescribable service should exit 2"
    );
}
