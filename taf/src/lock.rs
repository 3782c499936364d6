// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advisory locking of an authentication repository against concurrent
//! mutating sessions, via a `.taf-lock` file in the repository root.

use crate::error::{self, Result};
use fs2::FileExt;
use snafu::ResultExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on `<repo>/.taf-lock`, held for the duration of
/// a mutating operation (`create`, `init_repo`, `add_signing_key`,
/// `register_target_files`, `refresh_expiration`) and released on `Drop`.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
    path: PathBuf,
}

impl RepoLock {
    /// Attempts to acquire the lock at `<repo>/.taf-lock`. Fails with
    /// `Error::Busy` if another session already holds it.
    pub fn acquire<P: AsRef<Path>>(repo: P) -> Result<Self> {
        let path = repo.as_ref().join(".taf-lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .context(error::FileOpenSnafu { path: path.clone() })?;
        file.try_lock_exclusive()
            .map_err(|_| error::BusySnafu { path: path.clone() }.build())?;
        Ok(Self { file, path })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquisition_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let first = RepoLock::acquire(dir.path()).unwrap();
        let second = RepoLock::acquire(dir.path());
        assert!(second.is_err());
        drop(first);
        assert!(RepoLock::acquire(dir.path()).is_ok());
    }
}
