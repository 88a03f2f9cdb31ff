//! XChaCha20-Poly1305 implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::{error::VaultError, traits::Cipher};

/// Version tag for the XChaCha20-Poly1305 cipher.
pub const VERSION_TAG: u8 = 0x01;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag size.
pub const TAG_LEN: usize = 16;

/// XChaCha20-Poly1305 AEAD cipher.
///
/// Blob layout: `[nonce: 24 bytes][ciphertext + Poly1305 tag: N + 16 bytes]`.
pub struct XChaCha20Poly1305Cipher;

impl Cipher for XChaCha20Poly1305Cipher {
    fn version_tag(&self) -> u8 {
        VERSION_TAG
    }

    #[allow(deprecated)]
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher = XChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    #[allow(deprecated)]
    fn decrypt(&self, key: &[u8; 32], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Format(format!(
                "blob is {} bytes, need at least {}",
                blob.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        let nonce = XNonce::from_slice(nonce_bytes);
        let cipher = XChaCha20Poly1305::new(key.into());

        cipher
            .decrypt(nonce, Payload { msg: sealed, aad })
            .map_err(|_| VaultError::Integrity)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42u8; 32];

    #[test]
    fn round_trip_with_aad() {
        let cipher = XChaCha20Poly1305Cipher;
        let aad = b"binding:acme:telegram";

        let encrypted = cipher.encrypt(&KEY, b"123456:ABC-token", aad).unwrap();
        let decrypted = cipher.decrypt(&KEY, &encrypted, aad).unwrap();
        assert_eq!(decrypted, b"123456:ABC-token");
    }

    #[test]
    fn wrong_key_is_integrity_error() {
        let cipher = XChaCha20Poly1305Cipher;
        let other = [0x43u8; 32];

        let encrypted = cipher.encrypt(&KEY, b"secret", b"").unwrap();
        let err = cipher.decrypt(&other, &encrypted, b"").unwrap_err();
        assert!(matches!(err, VaultError::Integrity));
    }

    #[test]
    fn wrong_aad_is_integrity_error() {
        let cipher = XChaCha20Poly1305Cipher;

        let encrypted = cipher.encrypt(&KEY, b"secret", b"binding:a:telegram").unwrap();
        let err = cipher
            .decrypt(&KEY, &encrypted, b"binding:b:telegram")
            .unwrap_err();
        assert!(matches!(err, VaultError::Integrity));
    }

    #[test]
    fn every_flipped_bit_is_rejected() {
        let cipher = XChaCha20Poly1305Cipher;
        let encrypted = cipher.encrypt(&KEY, b"tok", b"aad").unwrap();

        for byte in 0..encrypted.len() {
            for bit in 0..8 {
                let mut tampered = encrypted.clone();
                tampered[byte] ^= 1 << bit;
                let err = cipher.decrypt(&KEY, &tampered, b"aad").unwrap_err();
                assert!(matches!(err, VaultError::Integrity), "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn too_short_is_format_error() {
        let cipher = XChaCha20Poly1305Cipher;

        let err = cipher.decrypt(&KEY, &[0u8; 39], b"").unwrap_err();
        assert!(matches!(err, VaultError::Format(_)));
    }

    #[test]
    fn nonce_and_tag_only_decrypts_to_empty() {
        let cipher = XChaCha20Poly1305Cipher;

        let encrypted = cipher.encrypt(&KEY, b"", b"").unwrap();
        assert_eq!(encrypted.len(), NONCE_LEN + TAG_LEN);
        assert!(cipher.decrypt(&KEY, &encrypted, b"").unwrap().is_empty());
    }

    #[test]
    fn fresh_nonce_per_call() {
        let cipher = XChaCha20Poly1305Cipher;

        let enc1 = cipher.encrypt(&KEY, b"same input", b"").unwrap();
        let enc2 = cipher.encrypt(&KEY, b"same input", b"").unwrap();
        assert_ne!(enc1[..NONCE_LEN], enc2[..NONCE_LEN]);
    }
}
