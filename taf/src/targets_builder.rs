// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `TargetsBuilder`: synthesizes per-target-repo commit/branch descriptor
//! files under `targets/`, then walks the whole `targets/` tree into
//! `tough::schema::Target` entries ready for `RoleModel::add_target`.
//!
//! Grounded on `original_source/taf/developer_tool.py::_update_target_repos`
//! (descriptor file shape and the "skip if not a git repo, or if it's the
//! auth repo itself" guard) and `register_target_files` (walk-everything-
//! under-`targets/`-and-hash shape); the walk-then-hash mechanics themselves
//! mirror a CLI's own target-directory walk, simplified to synchronous since
//! hashing an authoring repo's local files needs no task pool. There's no
//! typed target-name wrapper here: target names are plain `/`-joined
//! `String`s, matching `RoleModel`'s own `HashMap<String, Target>` content
//! maps.

use crate::error::{self, Result};
use crate::git::{self, GitProvider};
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use tough::schema::Target;
use walkdir::WalkDir;

/// One file discovered under a targets directory, with the name it should be
/// registered under (its path relative to that directory, using `/`
/// separators) and its computed `Target` descriptor.
pub struct DiscoveredTarget {
    pub name: String,
    pub target: Target,
}

#[derive(Serialize)]
struct RepoDescriptor {
    commit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
}

/// If `target_repo_path` is a git repository distinct from the auth
/// repository itself, writes `<targets_dir>/<repo_basename>` containing
/// canonical JSON `{"commit": sha [, "branch": name]}` (4-space indent, no
/// trailing newline) describing its current `HEAD`. Returns the written
/// path, or `None` if `target_repo_path` was skipped (not a repo, or it
/// *is* the auth repo).
pub fn register_target_from_repo(
    git: &dyn GitProvider,
    auth_repo_path: &Path,
    targets_dir: &Path,
    target_repo_path: &Path,
    add_branch: bool,
) -> Result<Option<PathBuf>> {
    if target_repo_path == auth_repo_path || !git.is_repo(target_repo_path) {
        return Ok(None);
    }

    let commit = git.head_commit(target_repo_path)?;
    let branch = if add_branch {
        git.current_branch(target_repo_path)?
    } else {
        None
    };
    let name = git::repo_basename(target_repo_path)?;

    fs::create_dir_all(targets_dir).context(error::DirCreateSnafu {
        path: targets_dir.to_path_buf(),
    })?;
    let path = targets_dir.join(&name);
    write_json_indent4(&path, &RepoDescriptor { commit, branch }, false)?;
    Ok(Some(path))
}

/// Serializes `value` as pretty JSON with a 4-space indent, optionally
/// appending a single trailing newline, and writes it atomically.
pub(crate) fn write_json_indent4<T: Serialize>(path: &Path, value: &T, trailing_newline: bool) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).context(error::FileWriteJsonSnafu {
        path: path.to_path_buf(),
    })?;
    if trailing_newline {
        buf.push(b'\n');
    }

    let dir = path.parent().context(error::PathParentSnafu {
        path: path.to_path_buf(),
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context(error::FileTempCreateSnafu {
        path: dir.to_path_buf(),
    })?;
    use std::io::Write;
    tmp.write_all(&buf).context(error::FileWriteSnafu {
        path: path.to_path_buf(),
    })?;
    tmp.persist(path).context(error::FilePersistSnafu {
        path: path.to_path_buf(),
    })?;
    Ok(())
}

/// Walks every regular file under `targets_dir` (the auth repository's
/// `targets/` directory — this never descends into `metadata/`, since that's
/// a sibling, not a subdirectory) and builds a `Target` for each, returning
/// them sorted by target name so that registration order, and therefore
/// `targets.json`'s serialized key order, is stable across runs and
/// operating systems.
///
/// Symlinks are followed (`WalkDir::follow_links(true)`), matching the
/// teacher's `build_targets`; a relative path that isn't valid UTF-8 is
/// rejected with `InvalidPath` rather than silently skipped or lossily
/// converted.
pub fn register_all_existing_targets(targets_dir: &Path) -> Result<Vec<DiscoveredTarget>> {
    let mut discovered = Vec::new();

    for entry in WalkDir::new(targets_dir).follow_links(true) {
        let entry = entry.context(error::WalkDirSnafu {
            path: targets_dir.to_path_buf(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(targets_dir).unwrap_or_else(|_| entry.path());
        let name = posix_name(relative)?;
        let target = Target::from_path(entry.path()).context(error::TargetFromPathSnafu {
            path: entry.path().to_path_buf(),
        })?;
        discovered.push(DiscoveredTarget { name, target });
    }

    discovered.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(discovered)
}

/// Converts a relative filesystem path to a `/`-separated target name,
/// rejecting anything that isn't valid UTF-8.
fn posix_name(relative: &Path) -> Result<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component.as_os_str().to_str().context(error::InvalidPathSnafu {
            path: relative.to_path_buf(),
        })?;
        segments.push(segment.to_owned());
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Git2Provider;

    #[test]
    fn discovers_files_in_sorted_posix_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/two.txt"), b"two").unwrap();
        fs::write(dir.path().join("a-one.txt"), b"one").unwrap();
        fs::write(dir.path().join("c-three.txt"), b"three").unwrap();

        let discovered = register_all_existing_targets(dir.path()).unwrap();
        let names: Vec<_> = discovered.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a-one.txt", "b/two.txt", "c-three.txt"]);
    }

    #[test]
    fn computed_target_hash_matches_manual_sha256() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();

        let discovered = register_all_existing_targets(dir.path()).unwrap();
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].target.length, 11);
        let expected = ring::digest::digest(&ring::digest::SHA256, b"hello world");
        assert_eq!(discovered[0].target.hashes.sha256.as_ref(), expected.as_ref());
    }

    #[test]
    fn empty_directory_yields_no_targets() {
        let dir = tempfile::tempdir().unwrap();
        let discovered = register_all_existing_targets(dir.path()).unwrap();
        assert!(discovered.is_empty());
    }

    fn init_repo_with_commit(dir: &Path) {
        let repo = git2::Repository::init(dir).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
    }

    #[test]
    fn descriptor_file_contains_commit_and_branch() {
        let root = tempfile::tempdir().unwrap();
        let auth_repo = root.path().join("auth");
        let target_repo = root.path().join("repoA");
        fs::create_dir_all(&auth_repo).unwrap();
        fs::create_dir_all(&target_repo).unwrap();
        init_repo_with_commit(&target_repo);

        let targets_dir = auth_repo.join("targets");
        let path =
            register_target_from_repo(&Git2Provider, &auth_repo, &targets_dir, &target_repo, true)
                .unwrap()
                .unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"commit\""));
        assert!(contents.contains("\"branch\""));
        assert!(!contents.ends_with('\n'));
    }

    #[test]
    fn skips_the_auth_repo_itself() {
        let root = tempfile::tempdir().unwrap();
        let auth_repo = root.path().join("auth");
        fs::create_dir_all(&auth_repo).unwrap();
        init_repo_with_commit(&auth_repo);

        let targets_dir = auth_repo.join("targets");
        let result =
            register_target_from_repo(&Git2Provider, &auth_repo, &targets_dir, &auth_repo, true).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn skips_non_git_directories() {
        let root = tempfile::tempdir().unwrap();
        let auth_repo = root.path().join("auth");
        let not_a_repo = root.path().join("plain-dir");
        fs::create_dir_all(&auth_repo).unwrap();
        fs::create_dir_all(&not_a_repo).unwrap();

        let targets_dir = auth_repo.join("targets");
        let result =
            register_target_from_repo(&Git2Provider, &auth_repo, &targets_dir, &not_a_repo, true).unwrap();
        assert!(result.is_none());
    }
}
