// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal ASN.1 SubjectPublicKeyInfo helpers. `aws_lc_rs`'s RSA/ECDSA keypair types hand back
//! their public key already in the encoding their own verification algorithms expect, so the
//! only thing this module extracts from a stored SPKI blob is the RSA modulus size in bits.

use crate::schema::error::{self, Result};
use snafu::OptionExt;

/// Returns the modulus size in bits of an RSA public key, given its DER `SubjectPublicKeyInfo`
/// encoding (the same bytes `RsaKeyPair::public_key()` produces).
///
/// This walks just enough of the DER SEQUENCE/INTEGER tag-length-value structure to find the
/// modulus INTEGER inside the nested `RSAPublicKey`; it does not attempt to be a general ASN.1
/// parser.
pub(super) fn rsa_modulus_bits(spki_der: &[u8]) -> Result<usize> {
    let modulus = find_last_integer(spki_der).context(error::PublicKeyParseSnafu)?;
    // DER INTEGERs are signed; a leading 0x00 byte disambiguating a positive number from a
    // negative one is not part of the modulus's significant bits.
    let significant = modulus.iter().position(|&b| b != 0).unwrap_or(modulus.len());
    Ok((modulus.len() - significant) * 8)
}

/// Finds the value of the last top-level INTEGER in a DER blob (the RSA modulus is encoded
/// after the exponent in the bit-string-wrapped `RSAPublicKey` sequence, but the modulus is by
/// far the largest integer present, so taking the longest INTEGER found is sufficient here).
fn find_last_integer(der: &[u8]) -> Option<&[u8]> {
    let mut best: Option<&[u8]> = None;
    let mut i = 0;
    while i + 1 < der.len() {
        if der[i] == 0x02 {
            if let Some((len, header_len)) = read_length(&der[i + 1..]) {
                let start = i + 1 + header_len;
                if start + len <= der.len() {
                    let candidate = &der[start..start + len];
                    if best.map_or(true, |b| candidate.len() > b.len()) {
                        best = Some(candidate);
                    }
                }
            }
        }
        i += 1;
    }
    best
}

/// Reads a DER length field, returning `(length, bytes consumed by the length field)`.
fn read_length(bytes: &[u8]) -> Option<(usize, usize)> {
    let first = *bytes.first()?;
    if first & 0x80 == 0 {
        Some((first as usize, 1))
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > std::mem::size_of::<usize>() || bytes.len() < 1 + n {
            return None;
        }
        let mut len = 0usize;
        for &b in &bytes[1..=n] {
            len = (len << 8) | b as usize;
        }
        Some((len, 1 + n))
    }
}
