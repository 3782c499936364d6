// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier CLI error: wraps `taf::Error` for library failures and adds the
//! argument-parsing/IO failures that only arise at the command-line boundary.
//! Grounded on `tuftool/src/error.rs`'s shape (snafu enum, `Backtrace`
//! fields), with an `exit_code` mapping added for §6's four-way exit code
//! contract, which `tuftool` itself (always exiting 0 or 1) has no
//! counterpart for.

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("{}", source))]
    #[snafu(context(false))]
    Taf {
        #[snafu(backtrace)]
        source: taf::Error,
    },

    #[snafu(display("Failed to read keys description {}: {}", path.display(), source))]
    KeysDescriptionRead {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse keys description {}: {}", path.display(), source))]
    KeysDescriptionParse {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to parse keys description as inline JSON: {}", source))]
    KeysDescriptionInline {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to initialize logger: {}", source))]
    Logger {
        source: log::SetLoggerError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to create directory {}: {}", path.display(), source))]
    DirCreate {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Malformed custom argument '{}': expected '--custom-<key> <value>' pairs", arg))]
    CustomArg { arg: String, backtrace: Backtrace },
}

impl Error {
    /// Maps this error onto §6's exit-code contract: `1` validation/IO,
    /// `2` usage error, `3` unmet threshold/user abort, `4` token error.
    /// Every other failure (including ones this binary can't anticipate,
    /// since `taf::Error` is `#[non_exhaustive]`) is `1`.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Error::Taf { source } => taf_exit_code(source),
            Error::CustomArg { .. } => 2,
            Error::KeysDescriptionRead { .. }
            | Error::KeysDescriptionParse { .. }
            | Error::KeysDescriptionInline { .. }
            | Error::Logger { .. }
            | Error::DirCreate { .. } => 1,
        }
    }
}

fn taf_exit_code(source: &taf::Error) -> i32 {
    match source {
        taf::Error::InsufficientKeys { .. } | taf::Error::PromptAborted { .. } => 3,
        taf::Error::Token { .. } | taf::Error::TokenLocked { .. } | taf::Error::TokenUnavailable { .. } => 4,
        _ => 1,
    }
}
