// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `repo create`/`repo add-dependency`/`repo remove-dependency`. Grounded on
//! `original_source/taf/tools/repo/__init__.py`'s click CLI (argument names,
//! the `--custom-<key> <value>` repeated-option convention) translated to
//! clap idiom, plus `tuftool/src/create.rs`/`root.rs` for the Rust-side
//! arg-struct/`run()` shape.

use crate::datetime::parse_datetime;
use crate::error::{self, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use taf::author::{self, AuthoringContext, RolesKeyInfos};
use taf::dependencies;
use taf::git::Git2Provider;
use taf::keystore::KeystoreReader;
use taf::prompt::TerminalPrompt;
use taf::token::NullTokenProvider;

#[derive(Debug, Parser)]
pub(crate) enum Command {
    /// Create a new authentication repository
    Create(CreateArgs),
    /// Record a dependency authentication repository
    AddDependency(AddDependencyArgs),
    /// Remove a recorded dependency authentication repository
    RemoveDependency(RemoveDependencyArgs),
}

impl Command {
    pub(crate) fn run(self) -> Result<()> {
        match self {
            Command::Create(args) => args.run(),
            Command::AddDependency(args) => args.run(),
            Command::RemoveDependency(args) => args.run(),
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) struct CreateArgs {
    /// Where to create the authentication repository
    path: PathBuf,

    /// A JSON object describing each role's keys, or a path to a file
    /// containing one: `{ "roles": { "<role>": { "number"?, "threshold"?,
    /// "length"?, "scheme"?, "yubikey"?, "passwords"? } }, "keystore"? }`.
    /// Omitted roles get their defaults; a name outside the four mandatory
    /// roles declares a delegated-targets role.
    #[arg(long = "keys-description")]
    keys_description: Option<String>,

    /// Location of the keystore files
    #[arg(long)]
    keystore: Option<PathBuf>,

    /// Commit the created repository to git with the given message
    #[arg(long)]
    commit: Option<String>,

    /// Mark this as a test authentication repository
    #[arg(long)]
    test: bool,

    /// Expiration for every role created; RFC 3339 or "in N days/weeks/hours"
    #[arg(long, value_parser = parse_datetime, default_value = "in 365 days")]
    expires: DateTime<Utc>,
}

impl CreateArgs {
    fn run(self) -> Result<()> {
        let (roles_key_infos, keystore_from_config) = match &self.keys_description {
            Some(arg) => {
                let config = load_keys_description(arg)?;
                (config.roles, config.keystore)
            }
            None => (RolesKeyInfos::new(), None),
        };
        let keystore_dir = self
            .keystore
            .or(keystore_from_config)
            .unwrap_or_else(|| self.path.join("keystore"));
        fs::create_dir_all(&keystore_dir).context(error::DirCreateSnafu {
            path: keystore_dir.clone(),
        })?;
        let keystore = KeystoreReader::new(keystore_dir);

        let mut prompt = TerminalPrompt;
        let mut tokens = NullTokenProvider;
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };

        author::create(
            &mut ctx,
            &self.path,
            &roles_key_infos,
            self.expires,
            self.commit.as_deref(),
            self.test,
        )?;
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub(crate) struct AddDependencyArgs {
    /// Path to the authentication repository the dependency is recorded on
    auth_path: PathBuf,

    /// Namespaced name of the dependency, e.g. `namespace/auth`
    dependency_name: String,

    /// Name of the branch the out-of-band commit belongs to
    branch_name: String,

    /// The out-of-band authentication commit (40-hex SHA)
    out_of_band_commit: String,

    /// Location of the dependency on disk, if present; its current commit
    /// and branch are validated against the two arguments above
    #[arg(long)]
    dependency_path: Option<PathBuf>,

    /// Location of the keystore files
    #[arg(long)]
    keystore: Option<PathBuf>,

    /// `--custom-<key> <value>` pairs, one per custom field, attached under
    /// `"custom"` in the recorded entry
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    custom: Vec<String>,
}

impl AddDependencyArgs {
    fn run(self) -> Result<()> {
        let keystore_dir = self.keystore.unwrap_or_else(|| self.auth_path.join("keystore"));
        let keystore = KeystoreReader::new(keystore_dir);
        let mut prompt = TerminalPrompt;
        let mut tokens = NullTokenProvider;
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };

        let custom = parse_custom_args(&self.custom)?;
        dependencies::add_dependency(
            &mut ctx,
            &self.auth_path,
            &self.dependency_name,
            &self.branch_name,
            &self.out_of_band_commit,
            self.dependency_path.as_deref(),
            custom,
        )?;
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub(crate) struct RemoveDependencyArgs {
    /// Path to the authentication repository the dependency is recorded on
    auth_path: PathBuf,

    /// Namespaced name of the dependency to remove
    dependency_name: String,

    /// Location of the keystore files
    #[arg(long)]
    keystore: Option<PathBuf>,
}

impl RemoveDependencyArgs {
    fn run(self) -> Result<()> {
        let keystore_dir = self.keystore.unwrap_or_else(|| self.auth_path.join("keystore"));
        let keystore = KeystoreReader::new(keystore_dir);
        let mut prompt = TerminalPrompt;
        let mut tokens = NullTokenProvider;
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };

        dependencies::remove_dependency(&mut ctx, &self.auth_path, &self.dependency_name)?;
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct KeysDescriptionConfig {
    roles: RolesKeyInfos,
    #[serde(default)]
    keystore: Option<PathBuf>,
}

/// `arg` is either an inline JSON object or a path to a file containing one.
fn load_keys_description(arg: &str) -> Result<KeysDescriptionConfig> {
    if arg.trim_start().starts_with('{') {
        serde_json::from_str(arg).context(error::KeysDescriptionInlineSnafu)
    } else {
        let path = PathBuf::from(arg);
        let contents = fs::read_to_string(&path).context(error::KeysDescriptionReadSnafu { path: path.clone() })?;
        serde_json::from_str(&contents).context(error::KeysDescriptionParseSnafu { path })
    }
}

/// Parses trailing `--custom-<key> <value>` pairs from `click`'s own
/// unparsed-extra-args convention (`original_source`'s `ctx.args`), e.g.
/// `--custom-property some-value`.
fn parse_custom_args(args: &[String]) -> Result<BTreeMap<String, String>> {
    snafu::ensure!(
        args.len() % 2 == 0,
        error::CustomArgSnafu {
            arg: args.join(" "),
        }
    );
    let mut custom = BTreeMap::new();
    for pair in args.chunks_exact(2) {
        let key = pair[0]
            .strip_prefix("--custom-")
            .context(error::CustomArgSnafu { arg: pair[0].clone() })?;
        custom.insert(key.to_owned(), pair[1].clone());
    }
    Ok(custom)
}
