// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `RepositoriesManifest`: builds `targets/repositories.json`, the
//! authoring-time source of truth for which target git repositories belong
//! to this authentication repository and where to find them.
//!
//! Grounded on
//! `original_source/taf/developer_tool.py::generate_repositories_json`/
//! `_get_namespace_and_root`.

use crate::error::{self, Result};
use crate::git::GitProvider;
use crate::targets_builder::write_json_indent4;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct RepositoriesManifest {
    repositories: BTreeMap<String, RepositoryEntry>,
}

#[derive(Serialize)]
struct RepositoryEntry {
    urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom: Option<serde_json::Value>,
}

/// Resolves `(namespace, root_dir)` per `_get_namespace_and_root`: a missing
/// `namespace` is derived from `repo_path`'s parent directory name, and a
/// missing `root_dir` from its grandparent. An authentication repository
/// checked out directly under a filesystem root has no parent name to
/// derive a namespace from; Open Question (b) resolves this as a `Config`
/// rejection rather than silently falling back to an empty namespace.
fn derive_namespace_and_root(
    repo_path: &Path,
    namespace: Option<String>,
    root_dir: Option<PathBuf>,
) -> Result<(String, PathBuf)> {
    let parent = repo_path.parent().context(error::ConfigSnafu {
        message: format!(
            "cannot derive a namespace for {}: it has no parent directory",
            repo_path.display()
        ),
    })?;
    let namespace = match namespace {
        Some(namespace) => namespace,
        None => parent
            .file_name()
            .and_then(|name| name.to_str())
            .context(error::ConfigSnafu {
                message: format!(
                    "cannot derive a namespace for {}: its parent has no name",
                    repo_path.display()
                ),
            })?
            .to_owned(),
    };
    let root_dir = match root_dir {
        Some(root_dir) => root_dir,
        None => parent.parent().unwrap_or(parent).to_path_buf(),
    };
    Ok((namespace, root_dir))
}

/// Resolves the URL to record for `target_repo_path`: its `origin` remote if
/// one is configured, otherwise its filesystem path (made relative to
/// `targets_relative_dir` if given, in POSIX form).
fn resolve_url(
    git: &dyn GitProvider,
    target_repo_path: &Path,
    targets_relative_dir: Option<&Path>,
) -> Result<String> {
    if let Some(url) = git.remote_url(target_repo_path)? {
        return Ok(url);
    }
    let absolute = target_repo_path
        .canonicalize()
        .unwrap_or_else(|_| target_repo_path.to_path_buf());
    let path = match targets_relative_dir {
        Some(base) => pathdiff::diff_paths(&absolute, base).unwrap_or(absolute),
        None => absolute,
    };
    Ok(path.to_string_lossy().replace('\\', "/"))
}

/// Builds `<repo_path>/targets/repositories.json` by scanning every
/// immediate subdirectory of `root_dir/namespace` (deriving either from
/// `repo_path` if omitted) that is a git repository other than the auth
/// repository itself. `custom_data` supplies a `"custom"` blob for any
/// namespaced repository name it lists. Entries are written in lexicographic
/// order of their namespaced name, and the file ends in a single `\n`.
pub fn generate(
    git: &dyn GitProvider,
    repo_path: &Path,
    root_dir: Option<PathBuf>,
    namespace: Option<String>,
    targets_relative_dir: Option<&Path>,
    custom_data: &BTreeMap<String, serde_json::Value>,
) -> Result<PathBuf> {
    let (namespace, root_dir) = derive_namespace_and_root(repo_path, namespace, root_dir)?;
    let targets_directory = root_dir.join(&namespace);

    let mut repositories = BTreeMap::new();
    if targets_directory.is_dir() {
        let mut entries: Vec<_> = fs::read_dir(&targets_directory)
            .context(error::FileReadSnafu {
                path: targets_directory.clone(),
            })?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for target_repo_dir in entries {
            if !target_repo_dir.is_dir() || target_repo_dir == repo_path {
                continue;
            }
            if !git.is_repo(&target_repo_dir) {
                continue;
            }
            let basename = target_repo_dir
                .file_name()
                .and_then(|n| n.to_str())
                .context(error::InvalidPathSnafu {
                    path: target_repo_dir.clone(),
                })?
                .to_owned();
            let namespaced_name = if namespace.is_empty() {
                basename
            } else {
                format!("{namespace}/{basename}")
            };
            let url = resolve_url(git, &target_repo_dir, targets_relative_dir)?;
            let custom = custom_data.get(&namespaced_name).cloned();
            repositories.insert(namespaced_name, RepositoryEntry { urls: vec![url], custom });
        }
    }

    let targets_dir = repo_path.join("targets");
    fs::create_dir_all(&targets_dir).context(error::DirCreateSnafu {
        path: targets_dir.clone(),
    })?;
    let file_path = targets_dir.join("repositories.json");
    write_json_indent4(&file_path, &RepositoriesManifest { repositories }, true)?;
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Git2Provider;
    use std::fs;

    fn init_bare_git_dir(path: &Path) {
        fs::create_dir_all(path).unwrap();
        let repo = git2::Repository::init(path).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
    }

    #[test]
    fn generates_entries_in_lexicographic_order() {
        let root = tempfile::tempdir().unwrap();
        let ns_dir = root.path().join("ns");
        init_bare_git_dir(&ns_dir.join("repoB"));
        init_bare_git_dir(&ns_dir.join("repoA"));

        let repo_path = root.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();

        let custom_data = BTreeMap::new();
        let path = generate(
            &Git2Provider,
            &repo_path,
            Some(root.path().to_path_buf()),
            Some("ns".to_owned()),
            Some(root.path()),
            &custom_data,
        )
        .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        let repo_a_pos = contents.find("ns/repoA").unwrap();
        let repo_b_pos = contents.find("ns/repoB").unwrap();
        assert!(repo_a_pos < repo_b_pos);
    }

    #[test]
    fn skips_the_auth_repo_and_non_git_dirs() {
        let root = tempfile::tempdir().unwrap();
        let ns_dir = root.path().join("ns");
        fs::create_dir_all(&ns_dir).unwrap();
        let auth_repo = ns_dir.join("auth");
        init_bare_git_dir(&auth_repo);
        fs::create_dir_all(ns_dir.join("plain-dir")).unwrap();

        let custom_data = BTreeMap::new();
        let path = generate(
            &Git2Provider,
            &auth_repo,
            Some(root.path().to_path_buf()),
            Some("ns".to_owned()),
            None,
            &custom_data,
        )
        .unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "{\n    \"repositories\": {}\n}");
    }

    #[test]
    fn rejects_namespace_derivation_at_filesystem_root() {
        let err = derive_namespace_and_root(Path::new("/"), None, None).unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    #[test]
    fn custom_data_is_attached_by_namespaced_name() {
        let root = tempfile::tempdir().unwrap();
        let ns_dir = root.path().join("ns");
        init_bare_git_dir(&ns_dir.join("repoA"));
        let repo_path = root.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();

        let mut custom_data = BTreeMap::new();
        custom_data.insert("ns/repoA".to_owned(), serde_json::json!({"team": "core"}));

        let path = generate(
            &Git2Provider,
            &repo_path,
            Some(root.path().to_path_buf()),
            Some("ns".to_owned()),
            None,
            &custom_data,
        )
        .unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"custom\""));
        assert!(contents.contains("\"team\""));
    }
}
