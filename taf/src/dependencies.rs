// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `targets/dependencies.json`: the authoring-time record of which commit of
//! each dependency authentication repository this one was built against.
//!
//! Grounded on
//! `original_source/taf/tools/repo/__init__.py::add_dependency`/
//! `remove_dependency`; no Python implementation body for these two was
//! retrieved, so the on-disk shape follows §4's own `dependencies.json`
//! description and the read/merge/write structure mirrors
//! `repositories_manifest.rs`.

use crate::author::AuthoringContext;
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Default, Serialize, Deserialize)]
struct DependenciesManifest {
    dependencies: BTreeMap<String, DependencyEntry>,
}

#[derive(Clone, Serialize, Deserialize)]
struct DependencyEntry {
    #[serde(rename = "out-of-band-authentication")]
    out_of_band_commit: String,
    branch: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    custom: BTreeMap<String, String>,
}

fn manifest_path(repo_path: &Path) -> std::path::PathBuf {
    repo_path.join("targets").join("dependencies.json")
}

fn load(repo_path: &Path) -> Result<DependenciesManifest> {
    let path = manifest_path(repo_path);
    if !path.is_file() {
        return Ok(DependenciesManifest::default());
    }
    let contents = fs::read_to_string(&path).context(error::FileReadSnafu { path: path.clone() })?;
    serde_json::from_str(&contents).context(error::FileParseJsonSnafu { path })
}

fn save(repo_path: &Path, manifest: &DependenciesManifest) -> Result<()> {
    let targets_dir = repo_path.join("targets");
    fs::create_dir_all(&targets_dir).context(error::DirCreateSnafu { path: targets_dir.clone() })?;
    crate::targets_builder::write_json_indent4(&manifest_path(repo_path), manifest, true)
}

/// Records a dependency authentication repository at `out_of_band_commit` on
/// `branch_name`, then re-registers and re-signs every target file (the
/// manifest itself lives under `targets/`, so it must be hashed into
/// `targets.json` like any other target). Fails with `Duplicate` if
/// `dependency_name` is already recorded.
///
/// The dependency does not have to exist on the filesystem; if
/// `dependency_path` is given and names a git repository, its current
/// commit and branch are validated against `out_of_band_commit`/
/// `branch_name` rather than trusted blindly.
pub fn add_dependency(
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
    dependency_name: &str,
    branch_name: &str,
    out_of_band_commit: &str,
    dependency_path: Option<&Path>,
    custom: BTreeMap<String, String>,
) -> Result<()> {
    let mut manifest = load(repo_path)?;
    ensure!(
        !manifest.dependencies.contains_key(dependency_name),
        error::DuplicateSnafu {
            what: "dependency",
            id: dependency_name.to_owned(),
        }
    );
    if let Some(path) = dependency_path {
        if ctx.git.is_repo(path) {
            let commit = ctx.git.head_commit(path)?;
            ensure!(
                commit == out_of_band_commit,
                error::ConfigSnafu {
                    message: format!(
                        "dependency '{dependency_name}' at {} is at commit {commit}, which does not match the provided out-of-band commit {out_of_band_commit}",
                        path.display()
                    ),
                }
            );
            if let Some(branch) = ctx.git.current_branch(path)? {
                ensure!(
                    branch == branch_name,
                    error::ConfigSnafu {
                        message: format!(
                            "dependency '{dependency_name}' at {} is on branch '{branch}', which does not match '{branch_name}'",
                            path.display()
                        ),
                    }
                );
            }
        }
    }
    manifest.dependencies.insert(
        dependency_name.to_owned(),
        DependencyEntry {
            out_of_band_commit: out_of_band_commit.to_owned(),
            branch: branch_name.to_owned(),
            custom,
        },
    );
    save(repo_path, &manifest)?;
    crate::author::register_target_files(ctx, repo_path)
}

/// Drops `dependency_name` from the manifest, then re-registers and
/// re-signs every target file. Fails with `Config` if the name isn't
/// currently recorded.
pub fn remove_dependency(ctx: &mut AuthoringContext<'_>, repo_path: &Path, dependency_name: &str) -> Result<()> {
    let mut manifest = load(repo_path)?;
    ensure!(
        manifest.dependencies.remove(dependency_name).is_some(),
        error::ConfigSnafu {
            message: format!("no dependency named '{dependency_name}' is recorded"),
        }
    );
    save(repo_path, &manifest)?;
    crate::author::register_target_files(ctx, repo_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::{self, RolesKeyInfos};
    use crate::git::Git2Provider;
    use crate::keystore::KeystoreReader;
    use crate::prompt::ScriptedPrompt;
    use crate::token::test_support::FakeTokenProvider;
    use chrono::{DateTime, Duration, Utc};

    fn expires_in(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    // one [confirm: generate a missing keystore key, secret: unlock it] pair
    // per mandatory role (root, snapshot, targets, timestamp).
    fn created_repo_prompt() -> ScriptedPrompt {
        ScriptedPrompt::new()
            .with_confirm(true)
            .with_secret(Some("x"))
            .with_confirm(true)
            .with_secret(Some("x"))
            .with_confirm(true)
            .with_secret(Some("x"))
            .with_confirm(true)
            .with_secret(Some("x"))
    }

    // reloading every role's signer for a fresh `write_all` needs one secret
    // per mandatory role, no generate-key confirms.
    fn reload_prompt() -> ScriptedPrompt {
        ScriptedPrompt::new()
            .with_secret(Some("x"))
            .with_secret(Some("x"))
            .with_secret(Some("x"))
            .with_secret(Some("x"))
    }

    fn init_auth_repo(repo_path: &Path) {
        let keystore_dir = repo_path.join("keystore");
        fs::create_dir_all(&keystore_dir).unwrap();
        let keystore = KeystoreReader::new(keystore_dir);
        let mut prompt = created_repo_prompt();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        author::create(
            &mut ctx,
            repo_path,
            &RolesKeyInfos::new(),
            expires_in(365),
            None,
            false,
        )
        .unwrap();
    }

    #[test]
    fn add_dependency_then_remove_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();
        init_auth_repo(&repo_path);

        let keystore_dir = repo_path.join("keystore");
        let keystore = KeystoreReader::new(keystore_dir.clone());
        let mut prompt = reload_prompt();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        add_dependency(
            &mut ctx,
            &repo_path,
            "ns/dep",
            "main",
            "deadbeef",
            None,
            BTreeMap::new(),
        )
        .unwrap();

        let manifest = load(&repo_path).unwrap();
        assert!(manifest.dependencies.contains_key("ns/dep"));

        let mut prompt = reload_prompt();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        remove_dependency(&mut ctx, &repo_path, "ns/dep").unwrap();
        let manifest = load(&repo_path).unwrap();
        assert!(!manifest.dependencies.contains_key("ns/dep"));
    }

    #[test]
    fn add_dependency_rejects_duplicate_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();
        init_auth_repo(&repo_path);

        let keystore_dir = repo_path.join("keystore");
        let keystore = KeystoreReader::new(keystore_dir);
        let mut tokens = FakeTokenProvider::new();

        let mut prompt = reload_prompt();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        add_dependency(&mut ctx, &repo_path, "ns/dep", "main", "deadbeef", None, BTreeMap::new()).unwrap();

        let mut prompt = reload_prompt();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        let err = add_dependency(&mut ctx, &repo_path, "ns/dep", "main", "cafebabe", None, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, error::Error::Duplicate { .. }));
    }

    #[test]
    fn remove_dependency_rejects_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();
        init_auth_repo(&repo_path);

        let keystore_dir = repo_path.join("keystore");
        let keystore = KeystoreReader::new(keystore_dir);
        let mut prompt = reload_prompt();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        let err = remove_dependency(&mut ctx, &repo_path, "ns/dep").unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    fn init_repo_with_commit(dir: &Path) -> String {
        let repo = git2::Repository::init(dir).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
        repo.head().unwrap().peel_to_commit().unwrap().id().to_string()
    }

    #[test]
    fn add_dependency_rejects_mismatched_on_disk_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo_path = dir.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();
        init_auth_repo(&repo_path);

        let dep_path = dir.path().join("dep");
        fs::create_dir_all(&dep_path).unwrap();
        init_repo_with_commit(&dep_path);

        let keystore_dir = repo_path.join("keystore");
        let keystore = KeystoreReader::new(keystore_dir);
        let mut prompt = reload_prompt();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        let err = add_dependency(
            &mut ctx,
            &repo_path,
            "ns/dep",
            "main",
            "not-the-real-commit",
            Some(&dep_path),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }
}
