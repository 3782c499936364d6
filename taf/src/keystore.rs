// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `KeystoreReader`: read/write password-protected PEM RSA keypairs from a
//! directory, named `<key-name>` (private) and `<key-name>.pub` (public).

use crate::crypto::{self, KeystoreSigner, Signer};
use crate::error::{self, Result};
use crate::prompt::PromptPort;
use snafu::{OptionExt, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use tough::schema::decoded::{Decoded, Hex};
use tough::schema::key::Key;
use tough::sign::{decrypt_key, parse_keypair};

/// Minimum RSA key size this engine will generate or accept, in bits. Not
/// enforced upstream (the teacher's `gen_rsa_key` and the original source
/// both happily generate or load smaller keys); this crate enforces it.
pub const MIN_RSA_BITS: u16 = 2048;

/// Reads and writes password-protected PEM keypairs from a keystore
/// directory.
#[derive(Debug, Clone)]
pub struct KeystoreReader {
    dir: PathBuf,
}

impl KeystoreReader {
    /// Opens a keystore rooted at `dir` (the directory is not required to
    /// exist yet; `generate_and_write` creates it on demand).
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn public_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.pub"))
    }

    fn private_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Reads the public key named `name`, failing with `KeystoreNotFound` or
    /// `KeystoreCorrupt`.
    pub fn read_public(&self, name: &str) -> Result<(Key, Decoded<Hex>)> {
        let path = self.public_path(name);
        let pem_bytes = fs::read(&path).map_err(|_| {
            error::KeystoreNotFoundSnafu { path: path.clone() }.build()
        })?;
        let pem_str = std::str::from_utf8(&pem_bytes).map_err(|_| {
            error::KeystoreCorruptSnafu {
                path: path.clone(),
                message: "not valid UTF-8".to_owned(),
            }
            .build()
        })?;
        let keypair = parse_keypair(pem_str.as_bytes(), None).map_err(|_| {
            error::KeystoreCorruptSnafu {
                path: path.clone(),
                message: "not a recognized PEM keypair".to_owned(),
            }
            .build()
        })?;
        let key = keypair.tuf_key();
        let keyid = crypto::key_id(&key)?;
        Ok((key, keyid))
    }

    /// Reads and unlocks the private key named `name`. If
    /// `passwords.get(index)` is present it is used without prompting;
    /// otherwise the user is prompted up to three times via `prompt`, and
    /// `BadPassphrase` is returned if none succeed.
    pub fn read_private(
        &self,
        name: &str,
        passwords: &[String],
        index: usize,
        prompt: &mut dyn PromptPort,
    ) -> Result<Box<dyn Signer>> {
        let path = self.private_path(name);
        let pem_bytes = fs::read(&path).context(error::FileReadSnafu { path: path.clone() })?;

        if let Some(password) = passwords.get(index) {
            return self.unlock(&pem_bytes, Some(password), name);
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let password = prompt.read_secret(&format!("Passphrase for key '{name}'"));
            let Some(password) = password else {
                return error::BadPassphraseSnafu {
                    name: name.to_owned(),
                    attempts,
                }
                .fail();
            };
            match self.unlock(&pem_bytes, Some(&password), name) {
                Ok(signer) => return Ok(signer),
                Err(_) if attempts < 3 => continue,
                Err(_) => {
                    return error::BadPassphraseSnafu {
                        name: name.to_owned(),
                        attempts,
                    }
                    .fail()
                }
            }
        }
    }

    fn unlock(&self, pem_bytes: &[u8], password: Option<&str>, name: &str) -> Result<Box<dyn Signer>> {
        let decrypted = match password {
            Some(pw) => decrypt_key(pem_bytes, pw).unwrap_or_else(|_| pem_bytes.to_vec()),
            None => pem_bytes.to_vec(),
        };
        let keypair = parse_keypair(&decrypted, None).map_err(|_| {
            error::BadPassphraseSnafu {
                name: name.to_owned(),
                attempts: 1u32,
            }
            .build()
        })?;
        Ok(Box::new(KeystoreSigner::new(keypair)))
    }

    /// Generates a new RSA keypair of `bits` length and writes both the
    /// private key (`name`, optionally passphrase-protected) and public key
    /// (`name.pub`) into this keystore. Fails with `WeakKey` if
    /// `bits < MIN_RSA_BITS` (Open Question c; neither the teacher nor the
    /// original source enforces this).
    pub fn generate_and_write(&self, name: &str, bits: u16, password: Option<&str>) -> Result<()> {
        snafu::ensure!(
            bits >= MIN_RSA_BITS,
            error::WeakKeySnafu {
                name: name.to_owned(),
                bits,
            }
        );
        fs::create_dir_all(&self.dir).context(error::DirCreateSnafu {
            path: self.dir.clone(),
        })?;

        let pem_bytes = crypto::generate_rsa_key(bits, 65537, password)?;
        let keypair = parse_keypair(&pem_bytes, password).context(error::KeyPairParseSnafu)?;
        let public_key_der = match keypair.tuf_key() {
            Key::Rsa { keyval, .. } => keyval.public.to_vec(),
            Key::Ed25519 { keyval, .. } => keyval.public.to_vec(),
            Key::Ecdsa { keyval, .. } => keyval.public.to_vec(),
        };
        let public_pem = pem::encode(&pem::Pem::new("PUBLIC KEY", public_key_der));

        let private_path = self.private_path(name);
        fs::write(&private_path, &pem_bytes).context(error::FileWriteSnafu {
            path: private_path,
        })?;
        let public_path = self.public_path(name);
        fs::write(&public_path, public_pem.as_bytes()).context(error::FileWriteSnafu {
            path: public_path,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;

    #[test]
    fn rejects_weak_keys() {
        let dir = tempfile::tempdir().unwrap();
        let ks = KeystoreReader::new(dir.path());
        let err = ks.generate_and_write("root", 1024, None).unwrap_err();
        assert!(matches!(err, error::Error::WeakKey { .. }));
    }

    #[test]
    fn read_private_fails_after_three_bad_attempts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("root"), b"not a real key").unwrap();
        let ks = KeystoreReader::new(dir.path());
        let mut prompt = ScriptedPrompt::new()
            .with_secret(Some("wrong1"))
            .with_secret(Some("wrong2"))
            .with_secret(Some("wrong3"));
        let err = ks.read_private("root", &[], 0, &mut prompt).unwrap_err();
        assert!(matches!(err, error::Error::BadPassphrase { attempts: 3, .. }));
    }
}
