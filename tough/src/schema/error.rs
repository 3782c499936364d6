// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

/// The result type returned by the `schema` module.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors arising from the TUF data model itself: malformed keys, broken delegation references,
/// and failures while hashing/serializing a target file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Duplicate key ID: {}", keyid))]
    DuplicateKeyId { keyid: String, backtrace: Backtrace },

    #[snafu(display("Failed to open {}: {}", path.display(), source))]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to read {}: {}", path.display(), source))]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Key ID mismatch: listed {}, calculated {}", keyid, calculated))]
    InvalidKeyId {
        keyid: String,
        calculated: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to serialize {} for signing: {}", what, source))]
    JsonSerialization {
        what: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("No delegations present"))]
    NoDelegations,

    #[snafu(display("Unrecognized public key material"))]
    PublicKeyParse { backtrace: Backtrace },

    #[snafu(display("No role named '{}'", name))]
    RoleNotFound { name: String },

    #[snafu(display("Target '{}' not found", target_file))]
    TargetNotFound { target_file: String },

    #[snafu(display("Path {} is not a file", path.display()))]
    TargetNotAFile { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Path '{}' is not delegated by any parent role", child))]
    UnmatchedPath { child: String },

    #[snafu(display("Signature verification failed for role '{}'", role))]
    VerifyRole { role: String, backtrace: Backtrace },

    #[snafu(display("Threshold of {} signatures not met for role '{}', found {}", threshold, role, valid))]
    SignatureThreshold {
        role: String,
        threshold: u64,
        valid: u64,
        backtrace: Backtrace,
    },
}
