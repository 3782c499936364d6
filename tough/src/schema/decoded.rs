// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides `Decoded`, a wrapper around `Vec<u8>` that (de)serializes through a chosen string
//! `Encoding` (hex or base64), as used throughout TUF metadata for key material and signatures.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// A string encoding that `Decoded` can (de)serialize through.
pub trait Encoding: Debug {
    /// Decode a string into bytes.
    fn decode(s: &str) -> Result<Vec<u8>, String>;
    /// Encode bytes into a string.
    fn encode(bytes: &[u8]) -> String;
}

/// Marker type selecting hex (de)serialization for `Decoded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hex;

impl Encoding for Hex {
    fn decode(s: &str) -> Result<Vec<u8>, String> {
        hex::decode(s).map_err(|e| e.to_string())
    }

    fn encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }
}

/// Marker type selecting standard base64 (de)serialization for `Decoded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Base64;

impl Encoding for Base64 {
    fn decode(s: &str) -> Result<Vec<u8>, String> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.decode(s).map_err(|e| e.to_string())
    }

    fn encode(bytes: &[u8]) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(bytes)
    }
}

/// Wraps a `Vec<u8>`, (de)serializing through whatever `Encoding` `E` is chosen. Derefs to
/// `Vec<u8>` so it can be used as bytes everywhere a keyid, signature, or hash is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decoded<E: Encoding> {
    bytes: Vec<u8>,
    spooky: PhantomData<E>,
}

impl<E: Encoding> From<Vec<u8>> for Decoded<E> {
    fn from(bytes: Vec<u8>) -> Self {
        Decoded {
            bytes,
            spooky: PhantomData,
        }
    }
}

impl<E: Encoding> From<Decoded<E>> for Vec<u8> {
    fn from(decoded: Decoded<E>) -> Self {
        decoded.bytes
    }
}

impl<E: Encoding> Deref for Decoded<E> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl<E: Encoding> DerefMut for Decoded<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

impl<E: Encoding> AsRef<[u8]> for Decoded<E> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<'de, E: Encoding> Deserialize<'de> for Decoded<E> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = E::decode(&s).map_err(D::Error::custom)?;
        Ok(Decoded {
            bytes,
            spooky: PhantomData,
        })
    }
}

impl<E: Encoding> Serialize for Decoded<E> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&E::encode(&self.bytes))
    }
}
