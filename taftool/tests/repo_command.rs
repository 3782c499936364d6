// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn create_missing_required_args_is_usage_error() {
    Command::cargo_bin("taftool")
        .unwrap()
        .args(["repo", "create"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn format_output_prints_json_failure_on_stdout() {
    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args([
            "--format-output",
            "repo",
            "create",
            dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(contains(r#""updateSuccessful":false"#));
}

#[test]
fn create_on_existing_git_repo_fails_already_exists() {
    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args(["repo", "create", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("already"));
}

#[test]
fn create_rejects_malformed_inline_keys_description() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args([
            "repo",
            "create",
            dir.path().join("auth").to_str().unwrap(),
            "--keys-description",
            "{not valid json",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn create_rejects_missing_keys_description_file() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args([
            "repo",
            "create",
            dir.path().join("auth").to_str().unwrap(),
            "--keys-description",
            dir.path().join("does-not-exist.json").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn add_dependency_missing_required_args_is_usage_error() {
    Command::cargo_bin("taftool")
        .unwrap()
        .args(["repo", "add-dependency"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn add_dependency_rejects_malformed_custom_args() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args([
            "repo",
            "add-dependency",
            dir.path().to_str().unwrap(),
            "ns/dep",
            "main",
            "deadbeef",
            "--custom-missing-value",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn remove_dependency_unknown_name_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("taftool")
        .unwrap()
        .args([
            "repo",
            "remove-dependency",
            dir.path().to_str().unwrap(),
            "ns/nonexistent",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("no dependency named"));
}
