// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `RoleModel`: in-memory state for root/targets/snapshot/timestamp plus any
//! delegated-targets roles, their keys/thresholds/expirations, and the
//! signing keys currently loaded for each. `write_all` assembles, signs (in
//! the targets-before-snapshot-before-timestamp-before-root order the TUF
//! spec requires), and atomically writes every metadata file.
//!
//! Grounded on `tough::editor::RepositoryEditor`/`SignedRole` for the
//! write-out ordering and atomic-write discipline, and on
//! `tuftool/src/root.rs::clear_sigs` for "mutating a role's keys clears its
//! signatures" (here: signatures are always recomputed fresh from the
//! currently loaded signers, so a key change can never leave a stale
//! signature behind). Signing itself can't reuse `tough`'s `SignedRole`
//! machinery directly, because that machinery signs through
//! `tough::sign::Sign`/`KeySource`, which has no notion of a hardware-token
//! signature computed via `TokenProvider::sign`; `RoleModel` computes
//! canonical bytes via `tough::schema::Role::canonical_form` and dispatches
//! each signature itself.

use crate::crypto::{self, Signer};
use crate::error::{self, Result};
use crate::key_assembler::ResolvedKey;
use crate::token::TokenProvider;
use chrono::{DateTime, Utc};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tough::schema::decoded::{Decoded, Hex};
use tough::schema::key::Key;
use tough::schema::{
    DelegatedRole, DelegatedTargets, Delegations, Hashes, PathSet, Role as RoleTrait, RoleKeys,
    RoleType, Root, Signature, Signed, Snapshot, SnapshotMeta, Target, Targets, Timestamp,
    TimestampMeta,
};

const SPEC_VERSION: &str = "1.0.0";

/// Well-known top-level role names, matching `RoleType`'s serialized form.
pub const ROOT: &str = "root";
pub const TARGETS: &str = "targets";
pub const SNAPSHOT: &str = "snapshot";
pub const TIMESTAMP: &str = "timestamp";

fn is_top_level(role: &str) -> bool {
    matches!(role, ROOT | TARGETS | SNAPSHOT | TIMESTAMP)
}

/// A signing key currently loaded for a role, carrying its `keyid` so a
/// `Signature` can be emitted without re-deriving it at sign time.
enum RoleSigner {
    Keystore { keyid: Decoded<Hex>, signer: Box<dyn Signer> },
    Token { keyid: Decoded<Hex>, serial: String },
}

impl RoleSigner {
    fn keyid(&self) -> &Decoded<Hex> {
        match self {
            RoleSigner::Keystore { keyid, .. } | RoleSigner::Token { keyid, .. } => keyid,
        }
    }
}

/// One role's key/threshold/expiration/version state, and (for delegated
/// roles only) its path restrictions.
struct RoleEntry {
    keys: HashMap<Decoded<Hex>, Key>,
    keyids_order: Vec<Decoded<Hex>>,
    threshold: NonZeroU64,
    expires: DateTime<Utc>,
    version: NonZeroU64,
    paths: Option<PathSet>,
    terminating: bool,
}

impl RoleEntry {
    fn new_top_level(expires: DateTime<Utc>) -> Self {
        Self {
            keys: HashMap::new(),
            keyids_order: Vec::new(),
            threshold: NonZeroU64::new(1).unwrap(),
            expires,
            version: NonZeroU64::new(1).unwrap(),
            paths: None,
            terminating: false,
        }
    }

    fn role_keys(&self) -> RoleKeys {
        RoleKeys {
            keyids: self.keyids_order.clone(),
            threshold: self.threshold,
            _extra: HashMap::new(),
        }
    }
}

/// In-memory model of every role in one authentication repository.
pub struct RoleModel {
    consistent_snapshot: bool,
    roles: HashMap<String, RoleEntry>,
    delegated_order: Vec<String>,
    targets_content: HashMap<String, Target>,
    delegated_contents: HashMap<String, HashMap<String, Target>>,
    signers: HashMap<String, Vec<RoleSigner>>,
}

impl RoleModel {
    /// Starts a fresh model with the four top-level roles present (empty key
    /// sets, threshold 1, version 1, `expires` as given), no delegations.
    #[must_use]
    pub fn new(expires: DateTime<Utc>) -> Self {
        let mut roles = HashMap::new();
        for name in [ROOT, TARGETS, SNAPSHOT, TIMESTAMP] {
            roles.insert(name.to_owned(), RoleEntry::new_top_level(expires));
        }
        Self {
            consistent_snapshot: false,
            roles,
            delegated_order: Vec::new(),
            targets_content: HashMap::new(),
            delegated_contents: HashMap::new(),
            signers: HashMap::new(),
        }
    }

    /// Reconstructs a model from an existing repository's `metadata/`
    /// directory: every top-level role's keys/threshold (from the
    /// highest-versioned `*.root.json`), its own version/expiration (from
    /// its own file), and any delegated-targets roles named in
    /// `targets.json`'s delegations. No signers are loaded — callers that
    /// intend to rewrite any role must load a signer for it (and, since
    /// `write_all` always re-signs every role from its currently loaded
    /// signers, for every other role too) before calling `write_all` again.
    pub fn load(repo_dir: &Path) -> Result<Self> {
        let metadata_dir = repo_dir.join("metadata");
        let root = read_latest_root(&metadata_dir)?;
        let targets: Signed<Targets> = read_signed(&metadata_dir.join("targets.json"))?;
        let _snapshot: Signed<Snapshot> = read_signed(&metadata_dir.join("snapshot.json"))?;
        let timestamp: Signed<Timestamp> = read_signed(&metadata_dir.join("timestamp.json"))?;

        let mut roles = HashMap::new();
        for (role_type, role_keys) in &root.signed.roles {
            let name = role_name_for(*role_type).context(error::CorruptedSnafu {
                message: format!("root.json names an unknown role '{role_type}'"),
            })?;
            let (version, expires) = match name {
                ROOT => (root.signed.version, root.signed.expires),
                TARGETS => (targets.signed.version, targets.signed.expires),
                TIMESTAMP => (timestamp.signed.version, timestamp.signed.expires),
                SNAPSHOT => (_snapshot.signed.version, _snapshot.signed.expires),
                _ => unreachable!(),
            };
            let keys = role_keys
                .keyids
                .iter()
                .filter_map(|keyid| root.signed.keys.get(keyid).map(|k| (keyid.clone(), k.clone())))
                .collect::<HashMap<_, _>>();
            roles.insert(
                name.to_owned(),
                RoleEntry {
                    keys,
                    keyids_order: role_keys.keyids.clone(),
                    threshold: role_keys.threshold,
                    expires,
                    version,
                    paths: None,
                    terminating: false,
                },
            );
        }

        let mut delegated_order = Vec::new();
        let mut delegated_contents = HashMap::new();
        if let Some(delegations) = &targets.signed.delegations {
            for delegated_role in &delegations.roles {
                let path = metadata_dir.join(format!("{}.json", delegated_role.name));
                let signed: Signed<DelegatedTargets> = read_signed(&path)?;
                let keys = delegated_role
                    .keyids
                    .iter()
                    .filter_map(|keyid| delegations.keys.get(keyid).map(|k| (keyid.clone(), k.clone())))
                    .collect::<HashMap<_, _>>();
                roles.insert(
                    delegated_role.name.clone(),
                    RoleEntry {
                        keys,
                        keyids_order: delegated_role.keyids.clone(),
                        threshold: delegated_role.threshold,
                        expires: signed.signed.targets.expires,
                        version: signed.signed.targets.version,
                        paths: Some(delegated_role.paths.clone()),
                        terminating: delegated_role.terminating,
                    },
                );
                delegated_contents.insert(delegated_role.name.clone(), signed.signed.targets.targets);
                delegated_order.push(delegated_role.name.clone());
            }
        }

        Ok(Self {
            consistent_snapshot: root.signed.consistent_snapshot,
            roles,
            delegated_order,
            targets_content: targets.signed.targets,
            delegated_contents,
            signers: HashMap::new(),
        })
    }

    /// Declares a new delegated-targets role under `targets`, with its own
    /// key set (populated afterward via `add_verification_key`), threshold,
    /// and path restriction.
    pub fn add_delegated_role(
        &mut self,
        name: &str,
        expires: DateTime<Utc>,
        paths: PathSet,
        terminating: bool,
    ) -> Result<()> {
        ensure!(
            !self.roles.contains_key(name),
            error::DuplicateSnafu {
                what: "role",
                id: name.to_owned(),
            }
        );
        let mut entry = RoleEntry::new_top_level(expires);
        entry.paths = Some(paths);
        entry.terminating = terminating;
        self.roles.insert(name.to_owned(), entry);
        self.delegated_order.push(name.to_owned());
        self.delegated_contents.insert(name.to_owned(), HashMap::new());
        Ok(())
    }

    /// Sets `role`'s signature threshold. Fails if `t < 1` or `t` exceeds the
    /// role's current key count.
    pub fn set_threshold(&mut self, role: &str, t: u64) -> Result<()> {
        let entry = self.role_entry_mut(role)?;
        let t = NonZeroU64::new(t).context(error::ConfigSnafu {
            message: format!("threshold for '{role}' must be at least 1"),
        })?;
        ensure!(
            t.get() <= entry.keys.len() as u64,
            error::ConfigSnafu {
                message: format!(
                    "threshold {t} for '{role}' exceeds its key count {}",
                    entry.keys.len()
                ),
            }
        );
        entry.threshold = t;
        Ok(())
    }

    /// Adds a verification (public) key to `role`'s key set. Rejects an
    /// already-registered `keyid`.
    pub fn add_verification_key(&mut self, role: &str, key: Key) -> Result<Decoded<Hex>> {
        let keyid = crypto::key_id(&key)?;
        let entry = self.role_entry_mut(role)?;
        ensure!(
            !entry.keys.contains_key(&keyid),
            error::DuplicateSnafu {
                what: "key",
                id: hex::encode(&keyid),
            }
        );
        entry.keys.insert(keyid.clone(), key);
        entry.keyids_order.push(keyid.clone());
        Ok(keyid)
    }

    /// Registers an external signer (keystore-resident key or hardware
    /// token) capable of signing for `role`; required before `write_all` can
    /// produce a valid signature set for it.
    pub fn load_signing_key(&mut self, role: &str, resolved: ResolvedKey) -> Result<()> {
        ensure!(
            self.roles.contains_key(role),
            error::NoSuchRoleSnafu {
                role: role.to_owned(),
            }
        );
        let signer = match resolved {
            ResolvedKey::Keystore(signer) => {
                let keyid = crypto::key_id(&signer.public_key())?;
                RoleSigner::Keystore { keyid, signer }
            }
            ResolvedKey::Token { serial, keyid } => RoleSigner::Token { keyid, serial },
        };
        self.signers.entry(role.to_owned()).or_default().push(signer);
        Ok(())
    }

    /// Registers an external signature provider for `role`'s `key`, keyed by
    /// the key's own `keyid`; the key must already be a verification key on
    /// the role. Equivalent to `load_signing_key` for a `ResolvedKey::Token`
    /// whose public key is already known.
    pub fn add_external_signature_provider(&mut self, role: &str, key: &Key, serial: String) -> Result<()> {
        let keyid = crypto::key_id(key)?;
        self.load_signing_key(role, ResolvedKey::Token { serial, keyid })
    }

    /// Removes `keyid` from `role`. Fails if doing so would drop the key
    /// count below the role's current threshold.
    pub fn remove_key(&mut self, role: &str, keyid: &Decoded<Hex>) -> Result<()> {
        let entry = self.role_entry_mut(role)?;
        ensure!(
            entry.keys.len() as u64 > entry.threshold.get(),
            error::ConfigSnafu {
                message: format!(
                    "removing key would drop '{role}' below its threshold of {}",
                    entry.threshold
                ),
            }
        );
        entry.keys.remove(keyid);
        entry.keyids_order.retain(|k| k != keyid);
        if let Some(signers) = self.signers.get_mut(role) {
            signers.retain(|s| s.keyid() != keyid);
        }
        Ok(())
    }

    /// Advances `role`'s expiration. Refuses to move it backwards relative
    /// to the role's current recorded expiration.
    pub fn set_expires(&mut self, role: &str, new: DateTime<Utc>) -> Result<()> {
        let entry = self.role_entry_mut(role)?;
        ensure!(
            new > entry.expires,
            error::MonotonicViolationSnafu {
                role: role.to_owned(),
                new,
                current: entry.expires,
            }
        );
        entry.expires = new;
        Ok(())
    }

    /// Increments `role`'s version number by one.
    pub fn bump_version(&mut self, role: &str) -> Result<()> {
        let entry = self.role_entry_mut(role)?;
        entry.version = NonZeroU64::new(entry.version.get() + 1).unwrap();
        Ok(())
    }

    /// Registers `target` under `name` for the top-level `targets` role.
    pub fn add_target(&mut self, name: &str, target: Target) {
        self.targets_content.insert(name.to_owned(), target);
    }

    /// Registers `target` under `name` for the delegated role `role`.
    pub fn add_delegated_target(&mut self, role: &str, name: &str, target: Target) -> Result<()> {
        self.delegated_contents
            .get_mut(role)
            .context(error::NoSuchRoleSnafu {
                role: role.to_owned(),
            })?
            .insert(name.to_owned(), target);
        Ok(())
    }

    /// Every role's name and current signature threshold, used by workflows
    /// that must reload enough signers to satisfy `write_all`'s per-role
    /// check without needing to hardcode the role list.
    #[must_use]
    pub fn role_thresholds(&self) -> Vec<(String, u64)> {
        self.roles
            .iter()
            .map(|(name, entry)| (name.clone(), entry.threshold.get()))
            .collect()
    }

    fn role_entry_mut(&mut self, role: &str) -> Result<&mut RoleEntry> {
        self.roles.get_mut(role).context(error::NoSuchRoleSnafu {
            role: role.to_owned(),
        })
    }

    /// Signs and atomically writes every role's metadata file into
    /// `<repo>/metadata/`, in targets/delegated-targets → snapshot →
    /// timestamp → root order.
    pub fn write_all(&self, repo_dir: &Path, tokens: &mut dyn TokenProvider) -> Result<()> {
        let metadata_dir = repo_dir.join("metadata");
        fs::create_dir_all(&metadata_dir).context(error::DirCreateSnafu {
            path: metadata_dir.clone(),
        })?;

        let mut delegated_roles = Vec::new();
        let mut delegation_keys: HashMap<Decoded<Hex>, Key> = HashMap::new();
        let mut snapshot_meta = HashMap::new();
        for name in &self.delegated_order {
            let entry = &self.roles[name];
            let content = Targets {
                spec_version: SPEC_VERSION.to_owned(),
                version: entry.version,
                expires: entry.expires,
                targets: self.delegated_contents.get(name).cloned().unwrap_or_default(),
                delegations: None,
                _extra: HashMap::new(),
            };
            let signed = self.sign_role(
                DelegatedTargets {
                    name: name.clone(),
                    targets: content,
                },
                name,
                tokens,
            )?;
            self.write_role(&metadata_dir, &signed)?;
            snapshot_meta.insert(format!("{name}.json"), meta_entry(&signed)?);

            for (keyid, key) in &entry.keys {
                delegation_keys.insert(keyid.clone(), key.clone());
            }
            delegated_roles.push(DelegatedRole {
                name: name.clone(),
                keyids: entry.keyids_order.clone(),
                threshold: entry.threshold,
                paths: entry.paths.clone().unwrap_or_else(|| PathSet::Paths(Vec::new())),
                terminating: entry.terminating,
                targets: None,
            });
        }

        let targets_entry = &self.roles[TARGETS];
        let delegations = if delegated_roles.is_empty() {
            None
        } else {
            Some(Delegations {
                keys: delegation_keys,
                roles: delegated_roles,
            })
        };
        let targets_content = Targets {
            spec_version: SPEC_VERSION.to_owned(),
            version: targets_entry.version,
            expires: targets_entry.expires,
            targets: self.targets_content.clone(),
            delegations,
            _extra: HashMap::new(),
        };
        let signed_targets = self.sign_role(targets_content, TARGETS, tokens)?;
        self.write_role(&metadata_dir, &signed_targets)?;
        snapshot_meta.insert("targets.json".to_owned(), meta_entry(&signed_targets)?);

        let snapshot_entry = &self.roles[SNAPSHOT];
        let snapshot_content = Snapshot {
            spec_version: SPEC_VERSION.to_owned(),
            version: snapshot_entry.version,
            expires: snapshot_entry.expires,
            meta: snapshot_meta,
            _extra: HashMap::new(),
        };
        let signed_snapshot = self.sign_role(snapshot_content, SNAPSHOT, tokens)?;
        self.write_role(&metadata_dir, &signed_snapshot)?;

        let snapshot_bytes = signed_snapshot
            .signed
            .canonical_form()
            .context(error::CanonicalizeSnafu {
                role: SNAPSHOT.to_owned(),
            })?;
        let mut timestamp_meta = HashMap::new();
        timestamp_meta.insert(
            "snapshot.json".to_owned(),
            TimestampMeta {
                length: snapshot_bytes.len() as u64,
                hashes: Hashes {
                    sha256: Decoded::from(
                        ring::digest::digest(&ring::digest::SHA256, &snapshot_bytes)
                            .as_ref()
                            .to_vec(),
                    ),
                    _extra: HashMap::new(),
                },
                version: snapshot_entry.version,
                _extra: HashMap::new(),
            },
        );

        let timestamp_entry = &self.roles[TIMESTAMP];
        let timestamp_content = Timestamp {
            spec_version: SPEC_VERSION.to_owned(),
            version: timestamp_entry.version,
            expires: timestamp_entry.expires,
            meta: timestamp_meta,
            _extra: HashMap::new(),
        };
        let signed_timestamp = self.sign_role(timestamp_content, TIMESTAMP, tokens)?;
        self.write_role(&metadata_dir, &signed_timestamp)?;

        let root_entry = &self.roles[ROOT];
        let mut root_keys = HashMap::new();
        let mut role_map = HashMap::new();
        for name in [ROOT, TARGETS, SNAPSHOT, TIMESTAMP] {
            let entry = &self.roles[name];
            for (keyid, key) in &entry.keys {
                root_keys.insert(keyid.clone(), key.clone());
            }
            let role_type = match name {
                ROOT => RoleType::Root,
                TARGETS => RoleType::Targets,
                SNAPSHOT => RoleType::Snapshot,
                TIMESTAMP => RoleType::Timestamp,
                _ => unreachable!(),
            };
            role_map.insert(role_type, entry.role_keys());
        }
        let root_content = Root {
            spec_version: SPEC_VERSION.to_owned(),
            consistent_snapshot: self.consistent_snapshot,
            version: root_entry.version,
            expires: root_entry.expires,
            keys: root_keys,
            roles: role_map,
            _extra: HashMap::new(),
        };
        let signed_root = self.sign_role(root_content, ROOT, tokens)?;
        self.write_role(&metadata_dir, &signed_root)?;

        Ok(())
    }

    fn sign_role<T: RoleTrait + Clone>(
        &self,
        content: T,
        role: &str,
        tokens: &mut dyn TokenProvider,
    ) -> Result<Signed<T>> {
        let message = content.canonical_form().context(error::CanonicalizeSnafu {
            role: role.to_owned(),
        })?;
        let mut signatures = Vec::new();
        if let Some(signers) = self.signers.get(role) {
            for signer in signers {
                let sig = match signer {
                    RoleSigner::Keystore { signer, .. } => signer.sign(&message)?,
                    RoleSigner::Token { serial, .. } => tokens.sign(serial, &message)?,
                };
                signatures.push(Signature {
                    keyid: signer.keyid().clone(),
                    sig: Decoded::from(sig),
                });
            }
        }
        // A role written out with fewer signatures than its own threshold is
        // invalid metadata; fail fast here rather than let `write_all` emit
        // an under-signed file, since every mutating workflow must load a
        // signer for every role it rewrites (write_all rewrites all of them).
        let threshold = self.roles.get(role).map_or(1, |entry| entry.threshold.get());
        ensure!(
            signatures.len() as u64 >= threshold,
            error::InsufficientKeysSnafu {
                role: role.to_owned(),
                resolved: signatures.len() as u64,
                threshold,
            }
        );
        Ok(Signed {
            signed: content,
            signatures,
        })
    }

    fn write_role<T: RoleTrait>(&self, metadata_dir: &Path, signed: &Signed<T>) -> Result<()> {
        let filename = signed.signed.filename(self.consistent_snapshot);
        let path = metadata_dir.join(&filename);
        let data = serde_json::to_vec_pretty(signed).context(error::FileWriteJsonSnafu {
            path: path.clone(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(metadata_dir).context(error::FileTempCreateSnafu {
            path: metadata_dir.to_path_buf(),
        })?;
        tmp.write_all(&data).context(error::FileWriteSnafu { path: path.clone() })?;
        tmp.persist(&path).context(error::FilePersistSnafu { path })?;
        Ok(())
    }
}

fn read_signed<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Signed<T>> {
    let bytes = fs::read(path).context(error::FileReadSnafu {
        path: path.to_path_buf(),
    })?;
    serde_json::from_slice(&bytes).context(error::FileParseJsonSnafu {
        path: path.to_path_buf(),
    })
}

/// Finds the highest-versioned `*.root.json` file in `metadata_dir` and
/// parses it. `Root::filename` always version-prefixes regardless of
/// `consistent_snapshot` (see the module doc comment), so this is the only
/// root file naming convention this engine ever produces.
fn read_latest_root(metadata_dir: &Path) -> Result<Signed<Root>> {
    let mut best: Option<(u64, PathBuf)> = None;
    let entries = fs::read_dir(metadata_dir).context(error::FileReadSnafu {
        path: metadata_dir.to_path_buf(),
    })?;
    for entry in entries {
        let entry = entry.context(error::FileReadSnafu {
            path: metadata_dir.to_path_buf(),
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(version_str) = name.strip_suffix(".root.json") else { continue };
        let Ok(version) = version_str.parse::<u64>() else { continue };
        if best.as_ref().map_or(true, |(v, _)| version > *v) {
            best = Some((version, entry.path()));
        }
    }
    let (_, path) = best.context(error::CorruptedSnafu {
        message: format!("no *.root.json file found under {}", metadata_dir.display()),
    })?;
    read_signed(&path)
}

fn role_name_for(role_type: RoleType) -> Option<&'static str> {
    match role_type {
        RoleType::Root => Some(ROOT),
        RoleType::Targets => Some(TARGETS),
        RoleType::Snapshot => Some(SNAPSHOT),
        RoleType::Timestamp => Some(TIMESTAMP),
    }
}

fn meta_entry<T: RoleTrait>(signed: &Signed<T>) -> Result<SnapshotMeta> {
    let bytes = signed.signed.canonical_form().context(error::CanonicalizeSnafu {
        role: format!("{}", T::TYPE),
    })?;
    Ok(SnapshotMeta {
        length: Some(bytes.len() as u64),
        hashes: Some(Hashes {
            sha256: Decoded::from(
                ring::digest::digest(&ring::digest::SHA256, &bytes)
                    .as_ref()
                    .to_vec(),
            ),
            _extra: HashMap::new(),
        }),
        version: signed.signed.version(),
        _extra: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeystoreReader;
    use crate::token::test_support::FakeTokenProvider;
    use chrono::Duration;

    fn expires_in(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    fn load_keystore_role(model: &mut RoleModel, keystore: &KeystoreReader, role: &str, name: &str) {
        let (key, _keyid) = keystore.read_public(name).unwrap();
        model.add_verification_key(role, key).unwrap();
        let mut prompt = crate::prompt::ScriptedPrompt::new();
        let signer = keystore.read_private(name, &[], 0, &mut prompt).unwrap();
        model.load_signing_key(role, ResolvedKey::Keystore(signer)).unwrap();
    }

    fn build_minimal_model(dir: &Path) -> (RoleModel, KeystoreReader) {
        let keystore = KeystoreReader::new(dir);
        for role in [ROOT, TARGETS, SNAPSHOT, TIMESTAMP] {
            keystore.generate_and_write(role, 2048, None).unwrap();
        }
        let mut model = RoleModel::new(expires_in(30));
        for role in [ROOT, TARGETS, SNAPSHOT, TIMESTAMP] {
            load_keystore_role(&mut model, &keystore, role, role);
        }
        (model, keystore)
    }

    #[test]
    fn write_all_produces_every_top_level_file() {
        let repo_dir = tempfile::tempdir().unwrap();
        let (model, _keystore) = build_minimal_model(repo_dir.path());
        let mut tokens = FakeTokenProvider::new();
        model.write_all(repo_dir.path(), &mut tokens).unwrap();

        let metadata_dir = repo_dir.path().join("metadata");
        for filename in ["1.root.json", "targets.json", "snapshot.json", "timestamp.json"] {
            assert!(metadata_dir.join(filename).exists(), "missing {filename}");
        }
    }

    #[test]
    fn snapshot_records_real_targets_hash() {
        let repo_dir = tempfile::tempdir().unwrap();
        let (model, _keystore) = build_minimal_model(repo_dir.path());
        let mut tokens = FakeTokenProvider::new();
        model.write_all(repo_dir.path(), &mut tokens).unwrap();

        let metadata_dir = repo_dir.path().join("metadata");
        let targets_bytes = fs::read(metadata_dir.join("targets.json")).unwrap();
        let targets_signed: Signed<Targets> = serde_json::from_slice(&targets_bytes).unwrap();
        let expected_hash = ring::digest::digest(
            &ring::digest::SHA256,
            &targets_signed.signed.canonical_form().unwrap(),
        );

        let snapshot_bytes = fs::read(metadata_dir.join("snapshot.json")).unwrap();
        let snapshot_signed: Signed<Snapshot> = serde_json::from_slice(&snapshot_bytes).unwrap();
        let meta = snapshot_signed.signed.meta.get("targets.json").unwrap();
        assert_eq!(
            meta.hashes.as_ref().unwrap().sha256.as_ref(),
            expected_hash.as_ref()
        );
    }

    #[test]
    fn delegated_role_is_signed_and_reflected_in_snapshot() {
        let repo_dir = tempfile::tempdir().unwrap();
        let (mut model, keystore) = build_minimal_model(repo_dir.path());
        model
            .add_delegated_role("waves", expires_in(30), PathSet::Paths(vec!["waves/*".to_owned()]), false)
            .unwrap();
        keystore.generate_and_write("waves", 2048, None).unwrap();
        load_keystore_role(&mut model, &keystore, "waves", "waves");

        let mut tokens = FakeTokenProvider::new();
        model.write_all(repo_dir.path(), &mut tokens).unwrap();

        let metadata_dir = repo_dir.path().join("metadata");
        assert!(metadata_dir.join("waves.json").exists());

        let snapshot_bytes = fs::read(metadata_dir.join("snapshot.json")).unwrap();
        let snapshot_signed: Signed<Snapshot> = serde_json::from_slice(&snapshot_bytes).unwrap();
        assert!(snapshot_signed.signed.meta.contains_key("waves.json"));
    }

    #[test]
    fn token_backed_role_signs_via_token_provider() {
        let repo_dir = tempfile::tempdir().unwrap();
        let keystore = KeystoreReader::new(repo_dir.path());
        for role in [TARGETS, SNAPSHOT, TIMESTAMP] {
            keystore.generate_and_write(role, 2048, None).unwrap();
        }
        let mut model = RoleModel::new(expires_in(30));
        for role in [TARGETS, SNAPSHOT, TIMESTAMP] {
            load_keystore_role(&mut model, &keystore, role, role);
        }

        let mut tokens = FakeTokenProvider::new().with_token("12345", "1234");
        tokens.install("12345", None).unwrap();
        tokens.unlock("12345", "1234").unwrap();
        let root_key = tokens.public_key("12345").unwrap();
        let keyid = model.add_verification_key(ROOT, root_key).unwrap();
        model
            .load_signing_key(ROOT, ResolvedKey::Token { serial: "12345".to_owned(), keyid })
            .unwrap();

        model.write_all(repo_dir.path(), &mut tokens).unwrap();

        let root_bytes = fs::read(repo_dir.path().join("metadata").join("1.root.json")).unwrap();
        let root_signed: Signed<Root> = serde_json::from_slice(&root_bytes).unwrap();
        assert_eq!(root_signed.signatures.len(), 1);
    }

    #[test]
    fn remove_key_below_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = KeystoreReader::new(dir.path());
        keystore.generate_and_write("root", 2048, None).unwrap();
        let mut model = RoleModel::new(expires_in(30));
        let (key, keyid) = keystore.read_public("root").unwrap();
        model.add_verification_key(ROOT, key).unwrap();

        let err = model.remove_key(ROOT, &keyid).unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    #[test]
    fn set_expires_rejects_moving_backwards() {
        let mut model = RoleModel::new(expires_in(30));
        let err = model.set_expires(ROOT, expires_in(1)).unwrap_err();
        assert!(matches!(err, error::Error::MonotonicViolation { .. }));
    }

    #[test]
    fn duplicate_delegated_role_name_is_rejected() {
        let mut model = RoleModel::new(expires_in(30));
        model
            .add_delegated_role("waves", expires_in(30), PathSet::Paths(vec![]), false)
            .unwrap();
        let err = model
            .add_delegated_role("waves", expires_in(30), PathSet::Paths(vec![]), false)
            .unwrap_err();
        assert!(matches!(err, error::Error::Duplicate { .. }));
    }

    #[test]
    fn load_reconstructs_keys_thresholds_and_delegated_roles() {
        let repo_dir = tempfile::tempdir().unwrap();
        let (mut model, keystore) = build_minimal_model(repo_dir.path());
        model
            .add_delegated_role("waves", expires_in(30), PathSet::Paths(vec!["waves/*".to_owned()]), true)
            .unwrap();
        keystore.generate_and_write("waves", 2048, None).unwrap();
        load_keystore_role(&mut model, &keystore, "waves", "waves");
        let target_file = repo_dir.path().join("hello.txt");
        fs::write(&target_file, b"hello").unwrap();
        model.add_target("hello.txt", Target::from_path(&target_file).unwrap());

        let mut tokens = FakeTokenProvider::new();
        model.write_all(repo_dir.path(), &mut tokens).unwrap();

        let loaded = RoleModel::load(repo_dir.path()).unwrap();
        for role in [ROOT, TARGETS, SNAPSHOT, TIMESTAMP] {
            let entry = loaded.roles.get(role).unwrap();
            assert_eq!(entry.threshold.get(), 1);
            assert_eq!(entry.keys.len(), 1);
        }
        let waves = loaded.roles.get("waves").unwrap();
        assert_eq!(waves.threshold.get(), 1);
        assert!(waves.terminating);
        assert_eq!(loaded.delegated_order, vec!["waves".to_owned()]);
        assert!(loaded.targets_content.contains_key("hello.txt"));
    }
}
