// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secrets at Rest (XChaCha20-Poly1305)
//!
//! Seals small secrets (authorization token, router public key) before they
//! reach the local database.
//!
//! Sealed format: `version (1 byte) || nonce (24 bytes) || ciphertext || tag (16 bytes)`

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::Zeroize;

/// Sealing error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealError {
    #[error("Random number generator failed")]
    Rng,
    #[error("Sealing failed")]
    SealFailed,
    #[error("Opening failed: data may be corrupted or wrong key")]
    OpenFailed,
    #[error("Sealed blob too short")]
    TooShort,
    #[error("Unknown sealed format version: {0:#04x}")]
    UnknownVersion(u8),
}

const SEAL_VERSION: u8 = 0x02;
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

/// 256-bit key used to seal local secrets.
#[derive(Clone)]
pub struct SealingKey {
    bytes: [u8; 32],
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SealingKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl SealingKey {
    /// Generates a fresh random key.
    pub fn generate() -> Result<Self, SealError> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes).map_err(|_| SealError::Rng)?;
        Ok(SealingKey { bytes })
    }

    /// Wraps existing key material.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SealingKey { bytes }
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.bytes).into())
    }
}

/// Seals `plaintext` under `key` with a random nonce.
pub fn seal(key: &SealingKey, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce_bytes).map_err(|_| SealError::Rng)?;

    let ciphertext = key
        .cipher()
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| SealError::SealFailed)?;

    let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    out.push(SEAL_VERSION);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Opens a blob produced by [`seal`].
pub fn open(key: &SealingKey, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
    let (&version, rest) = sealed.split_first().ok_or(SealError::TooShort)?;
    if version != SEAL_VERSION {
        return Err(SealError::UnknownVersion(version));
    }
    if rest.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SealError::TooShort);
    }

    let (nonce, body) = rest.split_at(NONCE_SIZE);
    key.cipher()
        .decrypt(XNonce::from_slice(nonce), body)
        .map_err(|_| SealError::OpenFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = SealingKey::generate().unwrap();
        let sealed = seal(&key, b"router-key").unwrap();

        assert_eq!(sealed[0], SEAL_VERSION);
        assert_eq!(sealed.len(), 1 + NONCE_SIZE + b"router-key".len() + TAG_SIZE);
        assert_eq!(open(&key, &sealed).unwrap(), b"router-key");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = seal(&SealingKey::from_bytes([1u8; 32]), b"token").unwrap();
        let result = open(&SealingKey::from_bytes([2u8; 32]), &sealed);
        assert_eq!(result, Err(SealError::OpenFailed));
    }

    #[test]
    fn test_open_rejects_truncated_and_unknown_version() {
        let key = SealingKey::from_bytes([7u8; 32]);
        assert_eq!(open(&key, &[]), Err(SealError::TooShort));
        assert_eq!(open(&key, &[SEAL_VERSION, 0, 1]), Err(SealError::TooShort));

        let mut sealed = seal(&key, b"x").unwrap();
        sealed[0] = 0x01;
        assert_eq!(open(&key, &sealed), Err(SealError::UnknownVersion(0x01)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = SealingKey::from_bytes([9u8; 32]);
        assert!(format!("{:?}", key).contains("REDACTED"));
    }
}
