// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `CryptoProvider`: RSA key generation, canonical-JSON digests, and
//! sign/verify, unified behind one interface so `RoleModel`/`KeyAssembler`
//! don't care whether a signature came from a keystore key or a hardware
//! token.

use crate::error::{self, Result};
use aws_lc_rs::rand::SystemRandom;
use snafu::ResultExt;
use std::process::Command;
use tough::schema::decoded::{Decoded, Hex};
use tough::schema::key::Key;
use tough::sign::Sign;

/// Something capable of producing a signature over a message, and of
/// reporting its own public key. Implemented by both keystore-resident
/// keypairs (via `tough::sign::Sign`) and hardware-token handles.
pub trait Signer: Send + Sync {
    /// The public key this signer signs for, in `tough`'s schema form.
    fn public_key(&self) -> Key;

    /// Signs `message`, returning the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Adapts any `tough::sign::Sign` implementer (the keystore-backed RSA/
/// Ed25519/ECDSA keypairs `tough::sign::parse_keypair` returns) to `Signer`.
pub struct KeystoreSigner<T> {
    inner: T,
    rng: SystemRandom,
}

impl<T: Sign> KeystoreSigner<T> {
    /// Wraps a parsed `tough` keypair as a `Signer`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            rng: SystemRandom::new(),
        }
    }
}

impl<T: Sign> Signer for KeystoreSigner<T> {
    fn public_key(&self) -> Key {
        self.inner.tuf_key()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        // `Sign::sign` is `async fn` in `tough` because its trait is shared
        // with token-backed implementations that may suspend; the keystore
        // keypairs it's actually implemented for (RSA/Ed25519/ECDSA via
        // `aws_lc_rs`) never await anything, so driving the future with a
        // minimal single-poll executor is sufficient here.
        pollster::block_on(self.inner.sign(message, &self.rng)).context(error::SignSnafu)
    }
}

/// Computes the `keyid` (hex SHA256 of the key's canonical-JSON form) for a
/// `tough` schema key, as used wherever a `PublicKey.keyid` must be derived
/// rather than looked up.
pub fn key_id(key: &Key) -> Result<Decoded<Hex>> {
    key.key_id().context(error::KeyIdSnafu)
}

/// Generates a new RSA keypair by shelling out to `openssl genpkey`, exactly
/// as the teacher's key-generation command does (`aws_lc_rs` cannot generate
/// RSA keys). Returns the PEM-encoded private key bytes (PKCS8, optionally
/// AES-256 passphrase encrypted).
pub fn generate_rsa_key(bits: u16, exponent: u32, password: Option<&str>) -> Result<Vec<u8>> {
    let mut command = Command::new("openssl");
    command.args(["genpkey", "-algorithm", "RSA", "-pkeyopt"]);
    command.arg(format!("rsa_keygen_bits:{bits}"));
    command.arg("-pkeyopt");
    command.arg(format!("rsa_keygen_pubexp:{exponent}"));
    if let Some(password) = password {
        command.args(["-aes256", "-pass"]);
        command.arg(format!("pass:{password}"));
    }
    let command_str = format!("{command:?}");
    let output = command.output().context(error::CommandExecSnafu {
        command_str: command_str.clone(),
    })?;
    snafu::ensure!(
        output.status.success(),
        error::CommandStatusSnafu {
            command_str,
            status: output.status,
        }
    );
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tough::sign::parse_keypair;

    // Sample Ed25519 PKCS8 private key, generated for this test only.
    const ED25519_PKCS8: &[u8] = &[
        0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04,
        0x20, 0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec,
        0x2c, 0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c,
        0xae, 0x7f, 0x60,
    ];

    #[test]
    fn keystore_signer_produces_verifiable_signature() {
        let keypair = parse_keypair(ED25519_PKCS8, None).unwrap();
        let signer = KeystoreSigner::new(keypair);
        let sig = signer.sign(b"hello world").unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn key_id_is_stable() {
        let keypair = parse_keypair(ED25519_PKCS8, None).unwrap();
        let key = keypair.tuf_key();
        let a = key_id(&key).unwrap();
        let b = key_id(&key).unwrap();
        assert_eq!(a, b);
    }
}
