// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing of access tokens at rest.
//!
//! Every seal draws a fresh random 96-bit nonce from the system CSPRNG; the
//! nonce is stored next to the ciphertext.

use courier_core::CourierError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Holds the token encryption key for the lifetime of the store.
pub struct TokenCipher {
    key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key", &"[redacted]")
            .finish()
    }
}

impl TokenCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Parses a 64-character hex key as found in `storage.token_encryption_key`.
    pub fn from_hex(hex_key: &str) -> Result<Self, CourierError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| CourierError::Config(format!("token encryption key: {e}")))?,
        );
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CourierError::Config("token encryption key must be 32 bytes".to_string())
        })?;
        Ok(Self::new(key))
    }

    /// A random key, used by `courier config keygen` and tests.
    pub fn generate() -> Result<Self, CourierError> {
        let mut key = [0u8; 32];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CourierError::Internal("failed to generate random key".to_string()))?;
        Ok(Self::new(key))
    }

    /// Hex form accepted by [`TokenCipher::from_hex`].
    pub fn to_hex(&self) -> String {
        hex::encode(&self.key[..])
    }

    fn less_safe_key(&self) -> Result<LessSafeKey, CourierError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key[..])
            .map_err(|_| CourierError::Internal("failed to create AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypts `plaintext`, returning `(ciphertext_with_tag, nonce)`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; 12]), CourierError> {
        let key = self.less_safe_key()?;
        let mut nonce_bytes = [0u8; 12];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| CourierError::Internal("failed to generate random nonce".to_string()))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CourierError::Internal("AES-256-GCM encryption failed".to_string()))?;
        Ok((in_out, nonce_bytes))
    }

    /// Decrypts a value produced by [`TokenCipher::seal`].
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CourierError> {
        let nonce: [u8; 12] = nonce
            .try_into()
            .map_err(|_| CourierError::store("stored token nonce has wrong length"))?;
        let key = self.less_safe_key()?;
        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| {
                CourierError::store("token decryption failed: wrong key or corrupted data")
            })?;
        Ok(plaintext.to_vec())
    }
}
