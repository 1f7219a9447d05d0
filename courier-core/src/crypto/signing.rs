// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ed25519 challenge signing.

use ring::signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey};
use thiserror::Error;

/// Signing error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Invalid key seed")]
    InvalidSeed,
}

/// Ed25519 signature bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeSignature(pub [u8; 64]);

impl ChallengeSignature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Hex encoding, as sent to the relay.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Ed25519 key pair derived from the owner seed.
pub struct OwnerKeyPair {
    inner: Ed25519KeyPair,
    public_key: [u8; 32],
}

impl OwnerKeyPair {
    /// Derives the key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, SigningError> {
        let inner =
            Ed25519KeyPair::from_seed_unchecked(seed).map_err(|_| SigningError::InvalidSeed)?;
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(inner.public_key().as_ref());
        Ok(OwnerKeyPair { inner, public_key })
    }

    /// Returns the public key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> ChallengeSignature {
        let sig = self.inner.sign(message);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(sig.as_ref());
        ChallengeSignature(bytes)
    }
}

/// Verifies `signature` over `message` against a raw Ed25519 public key.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &ChallengeSignature) -> bool {
    UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(message, signature.as_bytes())
        .is_ok()
}
