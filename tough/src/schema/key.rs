// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `Key` type, as found in `root.json`'s `keys` map and `targets.json`'s delegation `keys`
//! map: a public key plus the signing scheme it's meant to be used with.

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use olpc_cjson::CanonicalFormatter;
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::HashMap;

/// A public key, tagged with its key type and signing scheme, as found in `root.json`'s or a
/// delegation's `keys` map.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "keytype")]
#[serde(rename_all = "lowercase")]
pub enum Key {
    /// An Ed25519 public key.
    #[serde(rename = "ed25519")]
    Ed25519 {
        /// The Ed25519 public key value.
        keyval: Ed25519Key,
        /// The signing scheme used with this key; must be "ed25519".
        scheme: Ed25519Scheme,
        /// Extra fields found during deserialization, kept for signature verification.
        #[serde(flatten)]
        _extra: HashMap<String, serde_json::Value>,
    },
    /// An RSA public key.
    #[serde(rename = "rsa")]
    Rsa {
        /// The RSA public key value.
        keyval: RsaKey,
        /// The signing scheme used with this key; must be "rsassa-pss-sha256".
        scheme: RsaScheme,
        /// Extra fields found during deserialization, kept for signature verification.
        #[serde(flatten)]
        _extra: HashMap<String, serde_json::Value>,
    },
    /// An ECDSA public key.
    #[serde(rename = "ecdsa")]
    Ecdsa {
        /// The ECDSA public key value.
        keyval: EcdsaKey,
        /// The signing scheme used with this key; must be "ecdsa-sha2-nistp256".
        scheme: EcdsaScheme,
        /// Extra fields found during deserialization, kept for signature verification.
        #[serde(flatten)]
        _extra: HashMap<String, serde_json::Value>,
    },
}

impl Key {
    /// Calculates the key ID of this key: the hex-encoded SHA256 digest of its canonical JSON
    /// form. TUF 4.2 requires the keyid to be calculated this way, over the whole key object
    /// (keytype, scheme, and keyval) as it appears in the metadata.
    pub fn key_id(&self) -> Result<Decoded<Hex>> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
        self.serialize(&mut ser)
            .context(error::JsonSerializationSnafu { what: "key" })?;
        Ok(Decoded::from(digest(&SHA256, &buf).as_ref().to_vec()))
    }
}

/// The raw key material of an Ed25519 key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Ed25519Key {
    /// The Ed25519 public key, hex encoded.
    pub public: Decoded<Hex>,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, serde_json::Value>,
}

/// The raw key material of an RSA key, in SPKI DER form, hex encoded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RsaKey {
    /// The RSA public key, hex encoded SPKI DER.
    pub public: Decoded<Hex>,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, serde_json::Value>,
}

/// The raw key material of an ECDSA key, in SPKI DER form, hex encoded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EcdsaKey {
    /// The ECDSA public key, hex encoded SPKI DER.
    pub public: Decoded<Hex>,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, serde_json::Value>,
}

/// The signing scheme used with an Ed25519 key. Only one scheme is defined by the TUF spec.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Ed25519Scheme {
    /// The only scheme defined for Ed25519 keys.
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// The signing scheme used with an RSA key.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RsaScheme {
    /// RSASSA-PSS with SHA256, the only scheme this engine produces.
    RsassaPssSha256,
}

/// The signing scheme used with an ECDSA key.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EcdsaScheme {
    /// ECDSA over NIST P-256 with SHA256, the only scheme this engine produces.
    EcdsaSha2Nistp256,
}
