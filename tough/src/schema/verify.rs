// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signature verification against a role's declared keys and threshold.

use crate::schema::error::{self, Result};
use crate::schema::key::{Key, RsaScheme};
use crate::schema::{Delegations, Role, RoleType, Root, Signed};
use ring::signature::{self as ring_sig, UnparsedPublicKey};
use snafu::ensure;

impl Root {
    /// Verifies `signed` against the keys and threshold this `Root` declares for `T::TYPE`,
    /// failing unless at least `threshold` distinct, listed keys produced a valid signature
    /// over `signed.signed`'s canonical form.
    pub fn verify_role<T: Role>(&self, signed: &Signed<T>) -> Result<()> {
        let role_keys = self
            .roles
            .get(&T::TYPE)
            .ok_or_else(|| error::Error::RoleNotFound {
                name: format!("{:?}", T::TYPE),
            })?;
        verify_signatures(
            self.keys(T::TYPE).collect(),
            role_keys.threshold.get(),
            signed,
        )
    }
}

impl Delegations {
    /// Verifies `signed` against the keyids/threshold a delegated role named `name` declares,
    /// using this `Delegations`'s key map to resolve keyids to key material.
    pub fn verify_role<T: Role>(&self, signed: &Signed<T>, name: &str) -> Result<()> {
        let role = self.role(name).ok_or_else(|| error::Error::RoleNotFound {
            name: name.to_string(),
        })?;
        let keys = role
            .keyids
            .iter()
            .filter_map(|keyid| self.keys.get(keyid))
            .collect();
        verify_signatures(keys, role.threshold.get(), signed)
    }
}

fn verify_signatures<T: Role>(keys: Vec<&Key>, threshold: u64, signed: &Signed<T>) -> Result<()> {
    let message = signed.signed.canonical_form()?;
    let mut valid = 0u64;
    for signature in &signed.signatures {
        for key in &keys {
            if key.key_id()?.as_ref() == signature.keyid.as_ref() && verify_one(key, &message, &signature.sig) {
                valid += 1;
                break;
            }
        }
    }
    ensure!(
        valid >= threshold,
        error::SignatureThresholdSnafu {
            role: format!("{:?}", T::TYPE),
            threshold,
            valid,
        }
    );
    Ok(())
}

fn verify_one(key: &Key, message: &[u8], sig: &[u8]) -> bool {
    match key {
        Key::Ed25519 { keyval, .. } => {
            UnparsedPublicKey::new(&ring_sig::ED25519, keyval.public.as_ref())
                .verify(message, sig)
                .is_ok()
        }
        Key::Rsa { keyval, scheme, .. } => {
            let algorithm: &dyn ring_sig::VerificationAlgorithm = match scheme {
                RsaScheme::RsassaPssSha256 => &ring_sig::RSA_PSS_2048_8192_SHA256,
            };
            UnparsedPublicKey::new(algorithm, keyval.public.as_ref())
                .verify(message, sig)
                .is_ok()
        }
        Key::Ecdsa { keyval, .. } => {
            UnparsedPublicKey::new(&ring_sig::ECDSA_P256_SHA256_ASN1, keyval.public.as_ref())
                .verify(message, sig)
                .is_ok()
        }
    }
}
