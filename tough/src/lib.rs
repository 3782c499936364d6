// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tough` provides the TUF data model and signing primitives used to author
//! [TUF repositories]: canonical-JSON role serialization, key/signature
//! handling, and the `sign`/`verify` machinery the roles are built on.
//!
//! This crate implements the [TUF version 1.0.0][spec] metadata model for
//! root/targets/snapshot/timestamp and delegated-targets roles. It does not
//! implement a TUF client: there is no network transport, local cache, or
//! trust-on-first-use bootstrap here, only the data model and cryptography
//! needed to build and sign that metadata.
//!
//! [TUF repositories]: https://theupdateframework.github.io/
//! [spec]: https://github.com/theupdateframework/specification/blob/9f148556ca15da2ec5c022c8b3e6f99a028e5fe5/tuf-spec.md

#![forbid(missing_debug_implementations, missing_copy_implementations)]
#![deny(rust_2018_idioms)]
// missing_docs is on its own line to make it easy to comment out when making changes.
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod error;
pub mod schema;
pub mod sign;
