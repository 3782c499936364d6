// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `KeyAssembler`: resolves a role's signing keys from keystore files and/or
//! hardware tokens up to its threshold, mediating the "load more?" and
//! "yubikey?" interactive prompts. Grounded on the candidate-name/
//! keystore-first/confirm-loop shape of the original Python implementation's
//! `_load_signing_keys`.

use crate::crypto::Signer;
use crate::error::{self, Result};
use crate::keystore::KeystoreReader;
use crate::prompt::PromptPort;
use crate::token::TokenProvider;
use snafu::{ensure, OptionExt};
use std::collections::HashMap;
use tough::schema::decoded::{Decoded, Hex};
use tough::schema::key::Key;

/// Per-role hint about where its keys live. `yubikey: None` means "ask the
/// user"; `Some(true)`/`Some(false)` pins the answer without prompting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleKeyInfo {
    pub yubikey: Option<bool>,
}

/// Where a role's keys may be resolved from, and how.
pub struct KeySources<'a> {
    pub keystore: Option<&'a KeystoreReader>,
    pub passwords: &'a [String],
    pub role_key_infos: &'a HashMap<String, RoleKeyInfo>,
    pub allow_token: bool,
}

/// A resolved signing key: either an unlocked keystore keypair, ready to
/// sign directly, or a live handle into a hardware token (signing for these
/// goes back through the owning `TokenProvider`, keyed by serial).
pub enum ResolvedKey {
    Keystore(Box<dyn Signer>),
    Token { serial: String, keyid: Decoded<Hex> },
}

impl ResolvedKey {
    /// The `tough` schema key this handle signs for.
    #[must_use]
    pub fn public_key(&self, loaded_tokens: &HashMap<String, Key>) -> Option<Key> {
        match self {
            ResolvedKey::Keystore(signer) => Some(signer.public_key()),
            ResolvedKey::Token { serial, .. } => loaded_tokens.get(serial).cloned(),
        }
    }
}

/// Builds the candidate name list for a role with `key_count` keys:
/// `[role]` if `key_count == 1`, else `[role1, role2, .. roleN]`.
pub(crate) fn candidate_names(role_name: &str, key_count: u64) -> Vec<String> {
    if key_count <= 1 {
        vec![role_name.to_owned()]
    } else {
        (1..=key_count).map(|i| format!("{role_name}{i}")).collect()
    }
}

/// Assembles signing keys for roles, holding the interactive ports needed to
/// do so (prompting, hardware-token access).
pub struct KeyAssembler<'a> {
    prompt: &'a mut dyn PromptPort,
    tokens: &'a mut dyn TokenProvider,
}

impl<'a> KeyAssembler<'a> {
    /// Creates an assembler bound to the given prompt and token ports for
    /// the duration of one authoring session.
    pub fn new(prompt: &'a mut dyn PromptPort, tokens: &'a mut dyn TokenProvider) -> Self {
        Self { prompt, tokens }
    }

    /// Resolves at least `threshold` (and at most `key_count`) signing keys
    /// for `role_name`, trying keystore candidates first and falling back to
    /// interactive acquisition (keystore prompt or hardware token) for any
    /// shortfall. Once threshold is met, offers to load additional keys one
    /// at a time via `PromptPort::confirm` until `key_count` is reached or
    /// the user declines.
    pub fn load_signing_keys(
        &mut self,
        role_name: &str,
        threshold: u64,
        key_count: u64,
        sources: &KeySources<'_>,
        loaded_tokens: &mut HashMap<String, Key>,
    ) -> Result<Vec<ResolvedKey>> {
        let candidates = candidate_names(role_name, key_count);
        let mut resolved: Vec<ResolvedKey> = Vec::new();
        let mut tried: Vec<bool> = vec![false; candidates.len()];

        if let Some(keystore) = sources.keystore {
            for (index, name) in candidates.iter().enumerate() {
                if keystore.read_public(name).is_err() {
                    continue;
                }
                if let Ok(signer) = keystore.read_private(name, sources.passwords, index, self.prompt) {
                    resolved.push(ResolvedKey::Keystore(signer));
                    tried[index] = true;
                }
            }
        }

        while (resolved.len() as u64) < threshold {
            let Some(index) = tried.iter().position(|done| !done) else {
                return error::InsufficientKeysSnafu {
                    role: role_name.to_owned(),
                    resolved: resolved.len() as u64,
                    threshold,
                }
                .fail();
            };
            tried[index] = true;
            let key = self.acquire_one(role_name, &candidates[index], index, sources, loaded_tokens)?;
            resolved.push(key);
        }

        while (resolved.len() as u64) < key_count {
            let Some(index) = tried.iter().position(|done| !done) else {
                break;
            };
            if !self.prompt.confirm(&format!(
                "Threshold for '{role_name}' reached with {} key(s); load another?",
                resolved.len()
            )) {
                break;
            }
            tried[index] = true;
            let key = self.acquire_one(role_name, &candidates[index], index, sources, loaded_tokens)?;
            resolved.push(key);
        }

        Ok(resolved)
    }

    /// Acquires exactly one key for `candidate_name`, choosing keystore or
    /// token per `role_key_infos[role_name].yubikey` (prompting if
    /// unspecified).
    fn acquire_one(
        &mut self,
        role_name: &str,
        candidate_name: &str,
        index: usize,
        sources: &KeySources<'_>,
        loaded_tokens: &mut HashMap<String, Key>,
    ) -> Result<ResolvedKey> {
        let hint = sources.role_key_infos.get(role_name).and_then(|i| i.yubikey);
        let use_token = match hint {
            Some(answer) => answer,
            None if sources.allow_token => {
                self.prompt
                    .confirm(&format!("Load key '{candidate_name}' from a hardware token?"))
            }
            None => false,
        };

        if use_token {
            ensure!(sources.allow_token, error::TokenUnavailableSnafu);
            self.acquire_token_key(candidate_name, loaded_tokens)
        } else {
            let keystore = sources.keystore.context(error::ConfigSnafu {
                message: format!("no keystore configured for role '{role_name}'"),
            })?;
            let signer = keystore.read_private(candidate_name, sources.passwords, index, self.prompt)?;
            Ok(ResolvedKey::Keystore(signer))
        }
    }

    /// Selects a token (prompting if more than one is attached), unlocks it
    /// by PIN, and records its public key in `loaded_tokens` so a later role
    /// sharing the same token doesn't re-prompt for the PIN.
    fn acquire_token_key(
        &mut self,
        candidate_name: &str,
        loaded_tokens: &mut HashMap<String, Key>,
    ) -> Result<ResolvedKey> {
        let serials = self.tokens.enumerate()?;
        let serial = match serials.len() {
            0 => {
                return error::TokenSnafu {
                    message: "no hardware tokens attached".to_owned(),
                }
                .fail()
            }
            1 => serials[0].clone(),
            _ => self
                .prompt
                .read_text(&format!(
                    "Multiple tokens attached ({}); enter serial for '{candidate_name}'",
                    serials.join(", ")
                ))
                .context(error::PromptAbortedSnafu)?,
        };

        if let Some(key) = loaded_tokens.get(&serial) {
            let keyid = crate::crypto::key_id(key)?;
            return Ok(ResolvedKey::Token { serial, keyid });
        }

        let pin = self
            .prompt
            .read_secret(&format!("PIN for token {serial}"))
            .context(error::PromptAbortedSnafu)?;
        self.tokens.unlock(&serial, &pin)?;
        let key = self.tokens.public_key(&serial)?;
        let keyid = crate::crypto::key_id(&key)?;
        loaded_tokens.insert(serial.clone(), key);
        Ok(ResolvedKey::Token { serial, keyid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;
    use crate::token::test_support::FakeTokenProvider;
    use std::collections::HashMap;

    #[test]
    fn resolves_single_keystore_key_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = KeystoreReader::new(dir.path());
        keystore.generate_and_write("timestamp", 2048, None).unwrap();

        let mut prompt = ScriptedPrompt::new();
        let mut tokens = FakeTokenProvider::new();
        let mut assembler = KeyAssembler::new(&mut prompt, &mut tokens);
        let role_infos = HashMap::new();
        let sources = KeySources {
            keystore: Some(&keystore),
            passwords: &[],
            role_key_infos: &role_infos,
            allow_token: false,
        };
        let mut loaded_tokens = HashMap::new();
        let resolved = assembler
            .load_signing_keys("timestamp", 1, 1, &sources, &mut loaded_tokens)
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(matches!(resolved[0], ResolvedKey::Keystore(_)));
    }

    #[test]
    fn no_keystore_configured_fails_with_config_error() {
        let mut prompt = ScriptedPrompt::new();
        let mut tokens = FakeTokenProvider::new();
        let mut assembler = KeyAssembler::new(&mut prompt, &mut tokens);
        let role_infos = HashMap::new();
        let sources = KeySources {
            keystore: None,
            passwords: &[],
            role_key_infos: &role_infos,
            allow_token: false,
        };
        let mut loaded_tokens = HashMap::new();
        let err = assembler
            .load_signing_keys("root", 2, 2, &sources, &mut loaded_tokens)
            .unwrap_err();
        assert!(matches!(err, error::Error::Config { .. }));
    }

    #[test]
    fn threshold_reached_prompt_stops_loading_when_declined() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = KeystoreReader::new(dir.path());
        keystore.generate_and_write("root1", 2048, None).unwrap();

        let mut prompt = ScriptedPrompt::new().with_confirm(false);
        let mut tokens = FakeTokenProvider::new();
        let mut assembler = KeyAssembler::new(&mut prompt, &mut tokens);
        let role_infos = HashMap::new();
        let sources = KeySources {
            keystore: Some(&keystore),
            passwords: &[],
            role_key_infos: &role_infos,
            allow_token: false,
        };
        let mut loaded_tokens = HashMap::new();
        let resolved = assembler
            .load_signing_keys("root", 1, 2, &sources, &mut loaded_tokens)
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
