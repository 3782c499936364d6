// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::default_trait_access)]

use snafu::{Backtrace, Snafu};

/// The result type returned by this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Key was rejected by the cryptography library: {}", source))]
    KeyRejected {
        source: aws_lc_rs::error::KeyRejected,
        backtrace: Backtrace,
    },

    #[snafu(display("Unrecognized or unsupported key type"))]
    KeyUnrecognized { backtrace: Backtrace },

    #[snafu(display("Failed to sign message: {}", source))]
    Sign {
        source: aws_lc_rs::error::Unspecified,
        backtrace: Backtrace,
    },
}
