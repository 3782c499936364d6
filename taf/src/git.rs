// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GitProvider`: HEAD commit, current branch, and remote URL for a local
//! target git repository.

use crate::error::{self, Result};
use snafu::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};

/// Reports on a local git repository's current state, as needed to build a
/// target descriptor or a `repositories.json` entry.
pub trait GitProvider {
    /// The 40-hex-character SHA of `HEAD`.
    fn head_commit(&self, repo_path: &Path) -> Result<String>;

    /// The name of the currently checked-out branch, if `HEAD` is not
    /// detached.
    fn current_branch(&self, repo_path: &Path) -> Result<Option<String>>;

    /// The fetch URL of the `origin` remote, if one is configured.
    fn remote_url(&self, repo_path: &Path) -> Result<Option<String>>;

    /// Whether `repo_path` is (the working directory root of) a git
    /// repository at all.
    fn is_repo(&self, repo_path: &Path) -> bool;

    /// Initializes a new git repository at `repo_path`.
    fn init(&self, repo_path: &Path) -> Result<()>;

    /// Stages every file under `repo_path` and commits the result with
    /// `message`, returning the new commit's SHA.
    fn commit_all(&self, repo_path: &Path, message: &str) -> Result<String>;
}

/// `GitProvider` backed by `git2` against the real on-disk repository.
#[derive(Debug, Default)]
pub struct Git2Provider;

impl Git2Provider {
    fn open(&self, repo_path: &Path) -> Result<git2::Repository> {
        git2::Repository::open(repo_path).context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })
    }
}

impl GitProvider for Git2Provider {
    fn head_commit(&self, repo_path: &Path) -> Result<String> {
        let repo = self.open(repo_path)?;
        let head = repo.head().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        let commit = head.peel_to_commit().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        Ok(commit.id().to_string())
    }

    fn current_branch(&self, repo_path: &Path) -> Result<Option<String>> {
        let repo = self.open(repo_path)?;
        let head = repo.head().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_owned))
    }

    fn remote_url(&self, repo_path: &Path) -> Result<Option<String>> {
        let repo = self.open(repo_path)?;
        match repo.find_remote("origin") {
            Ok(remote) => Ok(remote.url().map(str::to_owned)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(source) => Err(source).context(error::GitSnafu {
                path: repo_path.to_path_buf(),
            }),
        }
    }

    fn is_repo(&self, repo_path: &Path) -> bool {
        git2::Repository::open(repo_path).is_ok()
    }

    fn init(&self, repo_path: &Path) -> Result<()> {
        git2::Repository::init(repo_path).context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        Ok(())
    }

    fn commit_all(&self, repo_path: &Path, message: &str) -> Result<String> {
        let repo = self.open(repo_path)?;
        let mut index = repo.index().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .context(error::GitSnafu {
                path: repo_path.to_path_buf(),
            })?;
        index.write().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        let tree_id = index.write_tree().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        let tree = repo.find_tree(tree_id).context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        let sig = repo.signature().context(error::GitSnafu {
            path: repo_path.to_path_buf(),
        })?;
        let parents: Vec<_> = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().context(error::GitSnafu {
                path: repo_path.to_path_buf(),
            })?],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let commit_id = repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .context(error::GitSnafu {
                path: repo_path.to_path_buf(),
            })?;
        Ok(commit_id.to_string())
    }
}

/// Computes the basename of a target repository path, used as the
/// descriptor file's name and as the `repositories.json` entry's last path
/// segment.
pub fn repo_basename(repo_path: &Path) -> Result<String> {
    repo_path
        .file_name()
        .context(error::NoFileNameSnafu {
            path: repo_path.to_path_buf(),
        })?
        .to_str()
        .context(error::InvalidPathSnafu {
            path: repo_path.to_path_buf(),
        })
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_head_commit_and_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let sig = git2::Signature::now("Test", "test@example.com").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.write_tree().unwrap()
        };
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let provider = Git2Provider;
        assert!(provider.is_repo(dir.path()));
        let commit = provider.head_commit(dir.path()).unwrap();
        assert_eq!(commit.len(), 40);
        let branch = provider.current_branch(dir.path()).unwrap();
        assert!(branch.is_some());
        assert!(provider.remote_url(dir.path()).unwrap().is_none());
    }

    #[test]
    fn not_a_repo_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!Git2Provider.is_repo(dir.path()));
    }

    #[test]
    fn init_then_commit_all_creates_a_commit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let provider = Git2Provider;
        assert!(!provider.is_repo(dir.path()));
        provider.init(dir.path()).unwrap();
        assert!(provider.is_repo(dir.path()));
        let commit = provider.commit_all(dir.path(), "initial").unwrap();
        assert_eq!(commit.len(), 40);
        assert_eq!(provider.head_commit(dir.path()).unwrap(), commit);
    }
}
