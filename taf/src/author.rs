// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `RepositoryAuthor`: the top-level workflows (`create`, `add_signing_key`,
//! `init_repo`, `register_target_files`, `refresh_expiration`) that
//! orchestrate `RoleModel`, `KeyAssembler`, `TargetsBuilder`, and
//! `RepositoriesManifest` into a signed metadata set.
//!
//! Grounded on `original_source/taf/developer_tool.py::create_repository`
//! (the two-pass non-token-then-token registration order, implemented there
//! as two separate loops filtering on `role_key_infos.get("yubikey", False)`),
//! `::add_signing_key` (the root re-signing rotation), `::init_repo`, and
//! `::update_metadata_expiration_date`.

use crate::crypto;
use crate::error::{self, Result};
use crate::git::GitProvider;
use crate::key_assembler::{self, KeyAssembler, KeySources, ResolvedKey, RoleKeyInfo};
use crate::keystore::KeystoreReader;
use crate::lock::RepoLock;
use crate::prompt::PromptPort;
use crate::repositories_manifest;
use crate::role_model::{self, RoleModel};
use crate::targets_builder;
use crate::token::TokenProvider;
use chrono::{DateTime, Duration, Utc};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tough::schema::key::Key;
use tough::schema::PathSet;

const MANDATORY_ROLES: [&str; 4] = [role_model::ROOT, role_model::TARGETS, role_model::SNAPSHOT, role_model::TIMESTAMP];

/// Per-role key-generation/acquisition policy, from the `keys-description`
/// JSON config. Kept distinct from `key_assembler::RoleKeyInfo` (which only
/// carries the yubikey hint `KeyAssembler` itself needs): this carries the
/// full authoring-time policy — how many keys, what threshold, what RSA
/// length, which scheme string, and any scripted passwords.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RoleConfig {
    #[serde(default = "default_number")]
    pub number: u64,
    pub threshold: Option<u64>,
    #[serde(default = "default_length")]
    pub length: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub yubikey: bool,
    #[serde(default)]
    pub passwords: Vec<String>,
}

fn default_number() -> u64 {
    1
}

fn default_length() -> u16 {
    3072
}

fn default_scheme() -> String {
    "rsa-pkcs1v15-sha256".to_owned()
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            number: default_number(),
            threshold: None,
            length: default_length(),
            scheme: default_scheme(),
            yubikey: false,
            passwords: Vec::new(),
        }
    }
}

impl RoleConfig {
    /// Resolves `threshold` (defaulting to 1) and validates it against
    /// `number` and the key scheme string. The real `tough::schema::key::Key`
    /// RSA scheme tag is always `rsassa-pss-sha256` regardless of which of
    /// these two config strings is accepted here — `RsaScheme` has no
    /// `Pkcs1v15`-style variant — so this only validates the config
    /// vocabulary, not the on-wire tag a generated key ends up carrying.
    fn validate(&self, role: &str) -> Result<u64> {
        ensure!(
            self.number >= 1,
            error::ConfigSnafu {
                message: format!("role '{role}': number must be at least 1"),
            }
        );
        let threshold = self.threshold.unwrap_or(1);
        ensure!(
            threshold >= 1 && threshold <= self.number,
            error::ConfigSnafu {
                message: format!("role '{role}': threshold {threshold} must be between 1 and {}", self.number),
            }
        );
        ensure!(
            matches!(self.scheme.as_str(), "rsa-pkcs1v15-sha256" | "rsa-pss-sha256"),
            error::ConfigSnafu {
                message: format!("role '{role}': unknown scheme '{}'", self.scheme),
            }
        );
        Ok(threshold)
    }
}

/// The full `keys-description` config: one `RoleConfig` per role, keyed by
/// name. A `BTreeMap` so iteration (and therefore registration) order is
/// deterministic across runs.
pub type RolesKeyInfos = BTreeMap<String, RoleConfig>;

/// Bundles the external collaborators one authoring session needs — git
/// introspection, interactive prompting, hardware-token access, and
/// (optionally) a keystore directory with any passwords supplied
/// non-interactively — and is threaded through every workflow below by
/// `&mut` instead of living behind a process-wide singleton.
pub struct AuthoringContext<'a> {
    pub git: &'a dyn GitProvider,
    pub prompt: &'a mut dyn PromptPort,
    pub tokens: &'a mut dyn TokenProvider,
    pub keystore: Option<&'a KeystoreReader>,
    pub passwords: &'a [String],
}

/// Step 1-9 of repository creation: validates `roles_key_infos`, declares
/// any delegated roles, registers keys in two passes (non-token roles
/// first, so a keystore error fails fast before any PIN is requested),
/// optionally drops a `targets/test-auth-repo` marker, records every file
/// under `targets/` as a target, signs and writes every metadata file, and
/// optionally commits the result to git.
pub fn create(
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
    roles_key_infos: &RolesKeyInfos,
    expires: DateTime<Utc>,
    commit_message: Option<&str>,
    test: bool,
) -> Result<PathBuf> {
    ensure!(
        !ctx.git.is_repo(repo_path),
        error::AlreadyExistsSnafu {
            path: repo_path.to_path_buf(),
        }
    );
    let _lock = RepoLock::acquire(repo_path)?;

    let mut configs = roles_key_infos.clone();
    for role in MANDATORY_ROLES {
        configs.entry(role.to_owned()).or_insert_with(RoleConfig::default);
    }

    let mut thresholds = HashMap::new();
    for (role, config) in &configs {
        thresholds.insert(role.clone(), config.validate(role)?);
    }

    let mut model = RoleModel::new(expires);
    for role in configs.keys() {
        if !MANDATORY_ROLES.contains(&role.as_str()) {
            model.add_delegated_role(role, expires, PathSet::Paths(vec![format!("{role}/*")]), false)?;
        }
    }

    let mut loaded_tokens = HashMap::new();
    let (non_token, token_backed): (Vec<_>, Vec<_>) = configs.iter().partition(|(_, c)| !c.yubikey);
    for (role, config) in non_token {
        let threshold = thresholds[role];
        register_role_keys(&mut model, role, config, threshold, ctx, repo_path, &mut loaded_tokens)?;
    }
    for (role, config) in token_backed {
        let threshold = thresholds[role];
        register_role_keys(&mut model, role, config, threshold, ctx, repo_path, &mut loaded_tokens)?;
    }

    let targets_dir = repo_path.join("targets");
    fs::create_dir_all(&targets_dir).context(error::DirCreateSnafu { path: targets_dir.clone() })?;

    if test {
        let marker = targets_dir.join("test-auth-repo");
        fs::write(&marker, b"").context(error::FileWriteSnafu { path: marker })?;
    }

    for discovered in targets_builder::register_all_existing_targets(&targets_dir)? {
        model.add_target(&discovered.name, discovered.target);
    }

    model.write_all(repo_path, ctx.tokens)?;

    if let Some(message) = commit_message {
        ctx.git.init(repo_path)?;
        ctx.git.commit_all(repo_path, message)?;
    }

    Ok(repo_path.to_path_buf())
}

/// Registers up to `config.number` keys for `role`, resolving at least
/// `threshold` signers and recording every one as a verification key.
/// Dispatches to keystore-file or hardware-token provisioning per
/// `config.yubikey`.
fn register_role_keys(
    model: &mut RoleModel,
    role: &str,
    config: &RoleConfig,
    threshold: u64,
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
    loaded_tokens: &mut HashMap<String, Key>,
) -> Result<()> {
    if config.yubikey {
        return provision_yubikey_keys(model, role, config, threshold, ctx, repo_path);
    }

    let keystore = ctx.keystore.context(error::ConfigSnafu {
        message: format!("role '{role}' has no keystore configured"),
    })?;
    for name in key_assembler::candidate_names(role, config.number) {
        if keystore.read_public(&name).is_err()
            && ctx
                .prompt
                .confirm(&format!("Key '{name}' not found in keystore; generate a new one?"))
        {
            keystore.generate_and_write(&name, config.length, config.passwords.first().map(String::as_str))?;
        }
    }

    let role_infos = HashMap::from([(role.to_owned(), RoleKeyInfo { yubikey: Some(false) })]);
    let sources = KeySources {
        keystore: Some(keystore),
        passwords: &config.passwords,
        role_key_infos: &role_infos,
        allow_token: false,
    };
    let mut assembler = KeyAssembler::new(ctx.prompt, ctx.tokens);
    let resolved = assembler.load_signing_keys(role, threshold, config.number, &sources, loaded_tokens)?;
    register_resolved_keys(model, role, resolved, loaded_tokens)?;
    model.set_threshold(role, threshold)?;
    Ok(())
}

/// Provisions `config.number` token-backed keys for `role`: prompts for
/// insertion, reuses existing on-token material only with an explicit
/// no-wipe confirmation (otherwise wipes and installs a fresh on-device
/// key), and exports the token's self-signed certificate to
/// `<repo>/certs/<keyid>.cert` before registering it as an external
/// signature provider.
fn provision_yubikey_keys(
    model: &mut RoleModel,
    role: &str,
    config: &RoleConfig,
    threshold: u64,
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
) -> Result<()> {
    ensure!(ctx.tokens.available(), error::TokenUnavailableSnafu);
    let certs_dir = repo_path.join("certs");
    fs::create_dir_all(&certs_dir).context(error::DirCreateSnafu { path: certs_dir.clone() })?;

    for name in key_assembler::candidate_names(role, config.number) {
        if !ctx
            .prompt
            .confirm(&format!("Insert the hardware token for key '{name}' and press Enter"))
        {
            continue;
        }
        let serials = ctx.tokens.enumerate()?;
        let serial = match serials.len() {
            0 => {
                return error::TokenSnafu {
                    message: "no hardware tokens attached".to_owned(),
                }
                .fail()
            }
            1 => serials[0].clone(),
            _ => ctx
                .prompt
                .read_text(&format!(
                    "Multiple tokens attached ({}); enter serial for '{name}'",
                    serials.join(", ")
                ))
                .context(error::PromptAbortedSnafu)?,
        };
        let pin = ctx
            .prompt
            .read_secret(&format!("PIN for token {serial}"))
            .context(error::PromptAbortedSnafu)?;
        ctx.tokens.unlock(&serial, &pin)?;

        let reuse = matches!(
            ctx.tokens.state(&serial),
            Some(crate::token::TokenState::Installed) | Some(crate::token::TokenState::Unlocked)
        ) && ctx
            .prompt
            .confirm(&format!("Token {serial} already has a key installed; reuse it without wiping?"));
        let key = if reuse {
            ctx.tokens.public_key(&serial)?
        } else {
            ctx.tokens.install(&serial, None)?
        };
        let keyid = crypto::key_id(&key)?;

        let cert = ctx.tokens.export_cert(&serial)?;
        let cert_path = certs_dir.join(format!("{}.cert", hex::encode(&keyid)));
        fs::write(&cert_path, &cert).context(error::FileWriteSnafu { path: cert_path })?;

        model.add_verification_key(role, key)?;
        model.load_signing_key(role, ResolvedKey::Token { serial, keyid })?;
    }

    model.set_threshold(role, threshold)?;
    Ok(())
}

/// Adds every key in `resolved` to `role`'s verification-key set and loads
/// it as a signer in one pass.
fn register_resolved_keys(
    model: &mut RoleModel,
    role: &str,
    resolved: Vec<ResolvedKey>,
    loaded_tokens: &HashMap<String, Key>,
) -> Result<()> {
    for key in resolved {
        let public = key.public_key(loaded_tokens).context(error::ConfigSnafu {
            message: format!("could not determine the public key for a resolved key on role '{role}'"),
        })?;
        model.add_verification_key(role, public)?;
        model.load_signing_key(role, key)?;
    }
    Ok(())
}

/// Adds one new verification key to `role`'s key set (key rotation). Since
/// `root.json` records every role's key list, any role's key-set change
/// changes root's content and therefore requires root to be re-signed; this
/// naturally falls out of reloading every role's existing threshold
/// signers before `write_all`, which is required regardless of which role
/// changed (`write_all` re-signs every role from its currently loaded
/// signers every time). This only reloads `threshold(role)` signers per
/// role, not `number(role)` — extra signatures beyond threshold verify
/// nothing additional, so the original "threshold reached, load more?"
/// invitation is not repeated here.
pub fn add_signing_key(ctx: &mut AuthoringContext<'_>, repo_path: &Path, role: &str, new_key: Key) -> Result<()> {
    let _lock = RepoLock::acquire(repo_path)?;
    let mut model = RoleModel::load(repo_path)?;
    model.add_verification_key(role, new_key)?;
    reload_all_signers(&mut model, ctx)?;
    model.write_all(repo_path, ctx.tokens)?;
    Ok(())
}

/// Advances `role`'s expiration to `start_date + interval` and re-signs it
/// (and, since `write_all` always rewrites every role, every other role
/// too) with its currently-configured threshold of keys.
pub fn refresh_expiration(
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
    role: &str,
    interval_days: i64,
    start_date: DateTime<Utc>,
) -> Result<()> {
    let _lock = RepoLock::acquire(repo_path)?;
    let mut model = RoleModel::load(repo_path)?;
    model.set_expires(role, start_date + Duration::days(interval_days))?;
    reload_all_signers(&mut model, ctx)?;
    model.write_all(repo_path, ctx.tokens)?;
    Ok(())
}

/// Re-walks `<repo>/targets/` and rewrites every metadata file. Used after
/// any out-of-band change under `targets/` (a freshly generated
/// `repositories.json`/`dependencies.json`, or `init_repo`'s per-target-repo
/// descriptors) to fold the new content into a freshly signed set.
pub fn register_target_files(ctx: &mut AuthoringContext<'_>, repo_path: &Path) -> Result<()> {
    let mut model = RoleModel::load(repo_path)?;
    let targets_dir = repo_path.join("targets");
    for discovered in targets_builder::register_all_existing_targets(&targets_dir)? {
        model.add_target(&discovered.name, discovered.target);
    }
    reload_all_signers(&mut model, ctx)?;
    model.write_all(repo_path, ctx.tokens)?;
    Ok(())
}

/// Reloads `threshold(role)` signers for every role currently in `model`,
/// using `ctx.keystore`/`ctx.passwords` for keystore-backed roles and
/// prompting for hardware tokens otherwise. Required before any `write_all`
/// call against a model built via `RoleModel::load`, since that constructor
/// restores keys/thresholds but never signers.
fn reload_all_signers(model: &mut RoleModel, ctx: &mut AuthoringContext<'_>) -> Result<()> {
    let mut loaded_tokens = HashMap::new();
    for (role, threshold) in model.role_thresholds() {
        let role_infos = HashMap::new();
        let sources = KeySources {
            keystore: ctx.keystore,
            passwords: ctx.passwords,
            role_key_infos: &role_infos,
            allow_token: ctx.tokens.available(),
        };
        let mut assembler = KeyAssembler::new(ctx.prompt, ctx.tokens);
        let resolved = assembler.load_signing_keys(&role, threshold, threshold, &sources, &mut loaded_tokens)?;
        for key in resolved {
            model.load_signing_key(&role, key)?;
        }
    }
    Ok(())
}

/// Composes `create` → per-target-repo descriptor registration →
/// `repositories.json` generation → `register_target_files`. `commit`
/// (if any) happens last, once every file `init_repo` touches has been
/// written, rather than inside `create`'s own (suppressed) commit step.
#[allow(clippy::too_many_arguments)]
pub fn init_repo(
    ctx: &mut AuthoringContext<'_>,
    repo_path: &Path,
    roles_key_infos: &RolesKeyInfos,
    expires: DateTime<Utc>,
    test: bool,
    target_repo_paths: &[PathBuf],
    add_branch: bool,
    root_dir: Option<PathBuf>,
    namespace: Option<String>,
    targets_relative_dir: Option<&Path>,
    custom_data: &BTreeMap<String, serde_json::Value>,
    commit_message: Option<&str>,
) -> Result<PathBuf> {
    let repo_path_buf = create(ctx, repo_path, roles_key_infos, expires, None, test)?;

    let targets_dir = repo_path.join("targets");
    for target_repo_path in target_repo_paths {
        targets_builder::register_target_from_repo(ctx.git, repo_path, &targets_dir, target_repo_path, add_branch)?;
    }

    repositories_manifest::generate(ctx.git, repo_path, root_dir, namespace, targets_relative_dir, custom_data)?;

    register_target_files(ctx, repo_path)?;

    if let Some(message) = commit_message {
        ctx.git.init(repo_path)?;
        ctx.git.commit_all(repo_path, message)?;
    }

    Ok(repo_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Git2Provider;
    use crate::prompt::ScriptedPrompt;
    use crate::token::test_support::FakeTokenProvider;

    fn expires_in(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    #[test]
    fn role_config_validate_rejects_threshold_above_number() {
        let config = RoleConfig {
            number: 1,
            threshold: Some(2),
            ..RoleConfig::default()
        };
        let err = config.validate("root").unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    #[test]
    fn role_config_validate_rejects_unknown_scheme() {
        let config = RoleConfig {
            scheme: "ed25519".to_owned(),
            ..RoleConfig::default()
        };
        let err = config.validate("root").unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    fn created_repo_prompt() -> ScriptedPrompt {
        // one [confirm: generate a missing keystore key, secret: unlock it]
        // pair per mandatory role (root, snapshot, targets, timestamp); the
        // generated keys are unencrypted, so the secret's actual value never
        // matters.
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

    #[test]
    fn create_writes_every_role_with_default_config() {
        let root = tempfile::tempdir().unwrap();
        let repo_path = root.path().join("auth");
        let keystore_dir = root.path().join("keystore");
        let keystore = KeystoreReader::new(keystore_dir.clone());
        let mut prompt = created_repo_prompt();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };

        let roles_key_infos = RolesKeyInfos::new();
        let path = create(&mut ctx, &repo_path, &roles_key_infos, expires_in(365), None, false).unwrap();

        for file in ["1.root.json", "targets.json", "snapshot.json", "timestamp.json"] {
            assert!(path.join("metadata").join(file).exists(), "missing {file}");
        }
    }

    #[test]
    fn create_refuses_an_existing_git_repo() {
        let root = tempfile::tempdir().unwrap();
        let repo_path = root.path().join("auth");
        fs::create_dir_all(&repo_path).unwrap();
        git2::Repository::init(&repo_path).unwrap();

        let mut prompt = ScriptedPrompt::new();
        let mut tokens = FakeTokenProvider::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: None,
            passwords: &[],
        };
        let err = create(&mut ctx, &repo_path, &RolesKeyInfos::new(), expires_in(365), None, false).unwrap_err();
        assert!(matches!(err, error::Error::AlreadyExists { .. }));
    }

    fn reload_prompt() -> ScriptedPrompt {
        // reloading every role's signer for a fresh `write_all` needs one
        // secret per mandatory role, no generate-key confirms (the keys
        // already exist on disk from `create`).
        ScriptedPrompt::new()
            .with_secret(Some("x"))
            .with_secret(Some("x"))
            .with_secret(Some("x"))
            .with_secret(Some("x"))
    }

    #[test]
    fn refresh_expiration_round_trips_through_load() {
        let root = tempfile::tempdir().unwrap();
        let repo_path = root.path().join("auth");
        let keystore_dir = root.path().join("keystore");
        let keystore = KeystoreReader::new(keystore_dir.clone());
        let mut prompt = created_repo_prompt();
        let mut tokens = FakeTokenProvider::new();
        {
            let mut ctx = AuthoringContext {
                git: &Git2Provider,
                prompt: &mut prompt,
                tokens: &mut tokens,
                keystore: Some(&keystore),
                passwords: &[],
            };
            create(&mut ctx, &repo_path, &RolesKeyInfos::new(), expires_in(30), None, false).unwrap();
        }

        let mut prompt = reload_prompt();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        refresh_expiration(&mut ctx, &repo_path, role_model::TIMESTAMP, 400, Utc::now()).unwrap();

        let loaded = RoleModel::load(&repo_path).unwrap();
        let (_, threshold) = loaded
            .role_thresholds()
            .into_iter()
            .find(|(name, _)| name == role_model::TIMESTAMP)
            .unwrap();
        assert_eq!(threshold, 1);
    }

    #[test]
    fn refresh_expiration_rejects_moving_backwards() {
        let root = tempfile::tempdir().unwrap();
        let repo_path = root.path().join("auth");
        let keystore_dir = root.path().join("keystore");
        let keystore = KeystoreReader::new(keystore_dir.clone());
        let mut prompt = created_repo_prompt();
        let mut tokens = FakeTokenProvider::new();
        {
            let mut ctx = AuthoringContext {
                git: &Git2Provider,
                prompt: &mut prompt,
                tokens: &mut tokens,
                keystore: Some(&keystore),
                passwords: &[],
            };
            create(&mut ctx, &repo_path, &RolesKeyInfos::new(), expires_in(30), None, false).unwrap();
        }

        let mut prompt = ScriptedPrompt::new();
        let mut ctx = AuthoringContext {
            git: &Git2Provider,
            prompt: &mut prompt,
            tokens: &mut tokens,
            keystore: Some(&keystore),
            passwords: &[],
        };
        let err = refresh_expiration(&mut ctx, &repo_path, role_model::TIMESTAMP, 1, Utc::now() - Duration::days(100))
            .unwrap_err();
        assert!(matches!(err, error::Error::MonotonicViolation { .. }));
    }
}
