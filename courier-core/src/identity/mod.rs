// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Owner Identity
//!
//! The owner's signing identity is derived from a BIP-39 mnemonic. The
//! mnemonic is the only thing the user has to keep; the Ed25519 key used to
//! answer relay challenges is re-derived from it on every device.

use bip39::Mnemonic;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{ChallengeSignature, OwnerKeyPair};

/// Identity-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Random number generator failed")]
    Rng,
    #[error("Key derivation failed")]
    KeyDerivation,
}

/// Entropy size for a 12-word mnemonic.
const MNEMONIC_ENTROPY_BYTES: usize = 16;

/// Owner identity: mnemonic plus the signing key derived from it.
pub struct OwnerIdentity {
    mnemonic: Zeroizing<String>,
    key_pair: OwnerKeyPair,
}

impl OwnerIdentity {
    /// Generates a fresh identity with a 12-word mnemonic.
    pub fn generate() -> Result<Self, IdentityError> {
        let rng = SystemRandom::new();
        let mut entropy = [0u8; MNEMONIC_ENTROPY_BYTES];
        rng.fill(&mut entropy).map_err(|_| IdentityError::Rng)?;

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| IdentityError::InvalidMnemonic(e.to_string()));
        entropy.zeroize();

        Self::from_parsed(mnemonic?)
    }

    /// Restores an identity from existing mnemonic words.
    pub fn from_mnemonic(words: &str) -> Result<Self, IdentityError> {
        let mnemonic =
            Mnemonic::parse(words.trim()).map_err(|e| IdentityError::InvalidMnemonic(e.to_string()))?;
        Self::from_parsed(mnemonic)
    }

    fn from_parsed(mnemonic: Mnemonic) -> Result<Self, IdentityError> {
        let mut seed = mnemonic.to_seed("");
        let mut signing_seed = [0u8; 32];
        signing_seed.copy_from_slice(&seed[..32]);
        seed.zeroize();

        let key_pair = OwnerKeyPair::from_seed(&signing_seed);
        signing_seed.zeroize();

        Ok(OwnerIdentity {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            key_pair: key_pair.map_err(|_| IdentityError::KeyDerivation)?,
        })
    }

    /// Mnemonic words in order, for backup display.
    pub fn mnemonic_words(&self) -> Vec<String> {
        self.mnemonic
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Public signing key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        self.key_pair.public_key()
    }

    /// Public signing key as lowercase hex.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key_pair.public_key())
    }

    /// Signs a relay challenge.
    pub fn sign_challenge(&self, challenge: &[u8]) -> ChallengeSignature {
        self.key_pair.sign(challenge)
    }
}

impl std::fmt::Debug for OwnerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerIdentity")
            .field("public_key", &self.public_key_hex())
            .field("mnemonic", &"[REDACTED]")
            .finish()
    }
}
