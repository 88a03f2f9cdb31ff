//! Cipher trait for swappable authenticated encryption backends.

use crate::error::VaultError;

/// Authenticated encryption with associated data (AEAD).
///
/// Each implementation has a unique version tag stored as the first byte of
/// the encoded blob so ciphers can be rotated later.
pub trait Cipher: Send + Sync {
    /// Unique identifier for this cipher.
    fn version_tag(&self) -> u8;

    /// Encrypt `plaintext` under `key`, binding `aad`.
    ///
    /// Returns `[nonce || ciphertext || tag]`. The layout is cipher-specific
    /// but must be parseable by [`decrypt`](Self::decrypt).
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Must return [`VaultError::Format`] when the blob cannot hold a nonce
    /// and tag, and [`VaultError::Integrity`] when the tag does not verify.
    fn decrypt(&self, key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError>;
}
