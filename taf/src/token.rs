// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `TokenProvider`: enumerate, PIN-unlock, sign with, and install keys on a
//! PIV-capable hardware token. Grounded on the `yubihsm` crate's
//! client/object/authentication API shape, adapted to PIV semantics rather
//! than ported verbatim.

use crate::error::{self, Result};
use std::collections::HashMap;
use tough::schema::decoded::{Decoded, Hex};
use tough::schema::key::Key;

/// Self-signed certificate lifetime for tokens installed by `install`,
/// matching the ~100-year horizon used when an auth repository's signing
/// hardware isn't expected to be rotated on any externally-imposed schedule.
pub const EXPIRATION_INTERVAL_DAYS: u32 = 36_500;

/// State machine for one physical token: `Empty` (no key installed) →
/// `Installed` (key present, PIN not yet verified this session) →
/// `Unlocked` (PIN verified) → `Signing` (mid-operation). Three consecutive
/// wrong PINs move a token to `Locked`, terminal until an administrator
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No key has been installed on this token yet.
    Empty,
    /// A key is present but the PIN has not been verified this session.
    Installed,
    /// The PIN has been verified; signing operations may proceed.
    Unlocked,
    /// A signing operation is in progress.
    Signing,
    /// Three consecutive wrong PINs were entered; requires admin reset.
    Locked,
}

/// Abstract hardware-token capability: enumerate attached tokens, unlock by
/// PIN, sign, and (re)install a signing key.
pub trait TokenProvider {
    /// Lists the serials of attached tokens.
    fn enumerate(&mut self) -> Result<Vec<String>>;

    /// Attempts to unlock `serial` with `pin`. Three consecutive failures
    /// move the token to `TokenState::Locked`.
    fn unlock(&mut self, serial: &str, pin: &str) -> Result<()>;

    /// Returns the public key currently installed on `serial`. Requires the
    /// token to be at least `Installed`.
    fn public_key(&mut self, serial: &str) -> Result<Key>;

    /// Returns the token's self-signed X.509 certificate in DER form.
    fn export_cert(&mut self, serial: &str) -> Result<Vec<u8>>;

    /// Signs `data` using the key installed on `serial`. Requires
    /// `TokenState::Unlocked`.
    fn sign(&mut self, serial: &str, data: &[u8]) -> Result<Vec<u8>>;

    /// Bulk-erases `serial` and installs a new signing key (generated
    /// on-device if `private_pem` is `None`, imported otherwise), emitting a
    /// fresh self-signed certificate valid for `EXPIRATION_INTERVAL_DAYS`.
    fn install(&mut self, serial: &str, private_pem: Option<&[u8]>) -> Result<Key>;

    /// Current state of `serial`, or `None` if it isn't attached.
    fn state(&self, serial: &str) -> Option<TokenState>;

    /// Whether hardware-token support is available on this host at all. A
    /// provider that reports `false` here causes the authoring session to
    /// refuse to register token-backed roles while still operating normally
    /// for keystore-only workflows.
    fn available(&self) -> bool;
}

/// Detects hardware-token availability at startup: a best-effort probe that
/// logs a warning and degrades to "unavailable" rather than failing, exactly
/// as the original source's best-effort import of its token module does.
pub fn detect() -> bool {
    #[cfg(feature = "yubikey")]
    {
        yubihsm::Client::connect(&yubihsm::Connector::usb(&yubihsm::UsbConfig::default()), true)
            .is_ok()
    }
    #[cfg(not(feature = "yubikey"))]
    {
        log::warn!("hardware token support not compiled in; token-backed roles are unavailable");
        false
    }
}

/// `TokenProvider` that reports no tokens attached and no availability,
/// for CLI binaries built without the `yubikey` feature (or on a host
/// `detect` found nothing on). Every keystore-only workflow still works;
/// registering a token-backed role against this provider fails with
/// `TokenUnavailable`.
#[derive(Debug, Default)]
pub struct NullTokenProvider;

impl TokenProvider for NullTokenProvider {
    fn enumerate(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn unlock(&mut self, _serial: &str, _pin: &str) -> Result<()> {
        error::TokenUnavailableSnafu.fail()
    }

    fn public_key(&mut self, _serial: &str) -> Result<Key> {
        error::TokenUnavailableSnafu.fail()
    }

    fn export_cert(&mut self, _serial: &str) -> Result<Vec<u8>> {
        error::TokenUnavailableSnafu.fail()
    }

    fn sign(&mut self, _serial: &str, _data: &[u8]) -> Result<Vec<u8>> {
        error::TokenUnavailableSnafu.fail()
    }

    fn install(&mut self, _serial: &str, _private_pem: Option<&[u8]>) -> Result<Key> {
        error::TokenUnavailableSnafu.fail()
    }

    fn state(&self, _serial: &str) -> Option<TokenState> {
        None
    }

    fn available(&self) -> bool {
        false
    }
}

/// Test double used throughout the test suite so hardware is never required
/// to exercise `KeyAssembler`/`RoleModel`/`RepositoryAuthor`.
pub mod test_support {
    use super::{Key, TokenProvider, TokenState};
    use crate::error::{self, Result};
    use std::collections::HashMap;
    use tough::schema::decoded::{Decoded, Hex};
    use tough::schema::key::{Ed25519Key, Ed25519Scheme};

    /// An in-memory fake token: serials are pre-registered, PINs are fixed
    /// strings, and `sign` returns a deterministic placeholder signature
    /// rather than a real cryptographic one.
    #[derive(Debug, Default)]
    pub struct FakeTokenProvider {
        tokens: HashMap<String, FakeToken>,
    }

    #[derive(Debug, Clone)]
    struct FakeToken {
        pin: String,
        state: TokenState,
        wrong_pins: u32,
        key: Option<Key>,
    }

    impl FakeTokenProvider {
        /// Creates an empty fake provider.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a fake token with the given serial and PIN, starting
        /// in `TokenState::Empty`.
        #[must_use]
        pub fn with_token(mut self, serial: &str, pin: &str) -> Self {
            self.tokens.insert(
                serial.to_owned(),
                FakeToken {
                    pin: pin.to_owned(),
                    state: TokenState::Empty,
                    wrong_pins: 0,
                    key: None,
                },
            );
            self
        }
    }

    impl TokenProvider for FakeTokenProvider {
        fn enumerate(&mut self) -> Result<Vec<String>> {
            Ok(self.tokens.keys().cloned().collect())
        }

        fn unlock(&mut self, serial: &str, pin: &str) -> Result<()> {
            let token = self
                .tokens
                .get_mut(serial)
                .ok_or_else(|| error::TokenSnafu { message: format!("no such token {serial}") }.build())?;
            if token.state == TokenState::Locked {
                return error::TokenLockedSnafu {
                    serial: serial.to_owned(),
                }
                .fail();
            }
            if token.pin == pin {
                token.state = TokenState::Unlocked;
                token.wrong_pins = 0;
                Ok(())
            } else {
                token.wrong_pins += 1;
                if token.wrong_pins >= 3 {
                    token.state = TokenState::Locked;
                }
                error::TokenSnafu {
                    message: format!("wrong PIN for {serial}"),
                }
                .fail()
            }
        }

        fn public_key(&mut self, serial: &str) -> Result<Key> {
            self.tokens
                .get(serial)
                .and_then(|t| t.key.clone())
                .ok_or_else(|| error::TokenSnafu { message: format!("{serial} has no key") }.build())
        }

        fn export_cert(&mut self, _serial: &str) -> Result<Vec<u8>> {
            Ok(b"fake self-signed certificate".to_vec())
        }

        fn sign(&mut self, serial: &str, data: &[u8]) -> Result<Vec<u8>> {
            let token = self
                .tokens
                .get_mut(serial)
                .ok_or_else(|| error::TokenSnafu { message: format!("no such token {serial}") }.build())?;
            snafu::ensure!(
                token.state == TokenState::Unlocked,
                error::TokenSnafu {
                    message: format!("token {serial} is not unlocked")
                }
            );
            token.state = TokenState::Signing;
            let mut sig = data.to_vec();
            sig.extend_from_slice(serial.as_bytes());
            token.state = TokenState::Unlocked;
            Ok(sig)
        }

        fn install(&mut self, serial: &str, _private_pem: Option<&[u8]>) -> Result<Key> {
            let token = self
                .tokens
                .get_mut(serial)
                .ok_or_else(|| error::TokenSnafu { message: format!("no such token {serial}") }.build())?;
            let key = Key::Ed25519 {
                keyval: Ed25519Key {
                    public: Decoded::<Hex>::from(serial.as_bytes().to_vec()),
                    _extra: HashMap::new(),
                },
                scheme: Ed25519Scheme::Ed25519,
                _extra: HashMap::new(),
            };
            token.key = Some(key.clone());
            token.state = TokenState::Installed;
            Ok(key)
        }

        fn state(&self, serial: &str) -> Option<TokenState> {
            self.tokens.get(serial).map(|t| t.state)
        }

        fn available(&self) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeTokenProvider;
    use super::*;

    #[test]
    fn three_wrong_pins_lock_the_token() {
        let mut provider = FakeTokenProvider::new().with_token("1234", "000000");
        assert!(provider.unlock("1234", "wrong").is_err());
        assert!(provider.unlock("1234", "wrong").is_err());
        assert!(provider.unlock("1234", "wrong").is_err());
        assert_eq!(provider.state("1234"), Some(TokenState::Locked));
        assert!(provider.unlock("1234", "000000").is_err());
    }

    #[test]
    fn install_then_unlock_then_sign() {
        let mut provider = FakeTokenProvider::new().with_token("1234", "000000");
        provider.install("1234", None).unwrap();
        assert_eq!(provider.state("1234"), Some(TokenState::Installed));
        provider.unlock("1234", "000000").unwrap();
        assert_eq!(provider.state("1234"), Some(TokenState::Unlocked));
        let sig = provider.sign("1234", b"hello").unwrap();
        assert!(sig.starts_with(b"hello"));
        assert_eq!(provider.state("1234"), Some(TokenState::Unlocked));
    }
}
