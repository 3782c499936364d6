// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::default_trait_access)]

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

/// The result type returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by this crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// Malformed `keys-description`, `threshold > number`, unknown scheme.
    #[snafu(display("Invalid configuration: {}", message))]
    Config { message: String, backtrace: Backtrace },

    /// Repository already hosts a git repo (`create` on an existing one).
    #[snafu(display("{} already exists", path.display()))]
    AlreadyExists { path: PathBuf, backtrace: Backtrace },

    /// Advisory lock held by another session.
    #[snafu(display("Repository {} is locked by another session", path.display()))]
    Busy { path: PathBuf, backtrace: Backtrace },

    /// Adding an already-registered keyid.
    #[snafu(display("{} '{}' is already registered", what, id))]
    Duplicate {
        what: &'static str,
        id: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Git operation failed at {}: {}", path.display(), source))]
    Git {
        path: PathBuf,
        source: git2::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("{} is not a git repository", path.display()))]
    NotAGitRepo { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Path {} is not valid UTF-8", path.display()))]
    InvalidPath { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Keystore file not found: {}", path.display()))]
    KeystoreNotFound { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Keystore file {} is corrupt: {}", path.display(), message))]
    KeystoreCorrupt {
        path: PathBuf,
        message: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Wrong passphrase for keystore key {} (tried {} time(s))", name, attempts))]
    BadPassphrase {
        name: String,
        attempts: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("Key '{}' is too weak: {} bits (minimum 2048)", name, bits))]
    WeakKey {
        name: String,
        bits: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to run {}: {}", command_str, source))]
    CommandExec {
        command_str: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Command {} failed with {}", command_str, status))]
    CommandStatus {
        command_str: String,
        status: std::process::ExitStatus,
        backtrace: Backtrace,
    },

    #[snafu(display("Command {} output is not valid UTF-8: {}", command_str, source))]
    CommandUtf8 {
        command_str: String,
        source: std::string::FromUtf8Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Token error: {}", message))]
    Token { message: String, backtrace: Backtrace },

    #[snafu(display("Token {} is locked (too many failed PIN attempts)", serial))]
    TokenLocked { serial: String, backtrace: Backtrace },

    #[snafu(display("No hardware token support available"))]
    TokenUnavailable { backtrace: Backtrace },

    #[snafu(display(
        "Could not assemble enough keys for role '{}': got {}, need {}",
        role,
        resolved,
        threshold
    ))]
    InsufficientKeys {
        role: String,
        resolved: u64,
        threshold: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Key scheme mismatch for role '{}': expected {}, found {}", role, expected, found))]
    SchemeMismatch {
        role: String,
        expected: String,
        found: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Refusing to move expiration for role '{}' backwards: {} is not after {}",
        role,
        new,
        current
    ))]
    MonotonicViolation {
        role: String,
        new: chrono::DateTime<chrono::Utc>,
        current: chrono::DateTime<chrono::Utc>,
        backtrace: Backtrace,
    },

    #[snafu(display("No such role '{}'", role))]
    NoSuchRole { role: String, backtrace: Backtrace },

    #[snafu(display(
        "Detected inconsistent cross-references between signed metadata roles: {}",
        message
    ))]
    Corrupted { message: String, backtrace: Backtrace },

    #[snafu(display("Failed to create directory {}: {}", path.display(), source))]
    DirCreate {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

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

    #[snafu(display("Failed to write {}: {}", path.display(), source))]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to create temporary file in {}: {}", path.display(), source))]
    FileTempCreate {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to persist {}: {}", path.display(), source))]
    FilePersist {
        path: PathBuf,
        source: tempfile::PersistError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse {} as JSON: {}", path.display(), source))]
    FileParseJson {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to serialize JSON for {}: {}", path.display(), source))]
    FileWriteJson {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Path {} has no file name", path.display()))]
    NoFileName { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Path {} has no parent directory", path.display()))]
    PathParent { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Failed to walk directory {}: {}", path.display(), source))]
    WalkDir {
        path: PathBuf,
        source: walkdir::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to build target from {}: {}", path.display(), source))]
    TargetFromPath {
        path: PathBuf,
        source: tough::schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to canonicalize {} metadata: {}", role, source))]
    Canonicalize {
        role: String,
        source: tough::schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to sign: {}", source))]
    Sign {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse keypair: {}", source))]
    KeyPairParse {
        source: tough::error::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to compute key ID: {}", source))]
    KeyId {
        source: tough::schema::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to decode PEM key: {}", source))]
    PemDecode {
        source: pem::PemError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to decrypt private key: {}", source))]
    KeyDecrypt {
        source: pkcs8::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Prompt aborted"))]
    PromptAborted { backtrace: Backtrace },
}
