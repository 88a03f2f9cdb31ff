//! Root-key vault: string encryption bound to an owner context.

use {base64::Engine, rand::RngCore, zeroize::Zeroizing};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, vault as vault_metrics};

use crate::{error::VaultError, traits::Cipher, xchacha20::XChaCha20Poly1305Cipher};

/// Random bytes in a generated webhook secret.
pub const SECRET_BYTES: usize = 24;

/// Required root key length.
const KEY_LEN: usize = 32;

/// Encrypts channel credentials with a static root key.
///
/// The key is loaded once at startup and zeroed on drop. There is no sealed
/// state: a `Vault` either holds a valid key or was never constructed.
pub struct Vault<C: Cipher = XChaCha20Poly1305Cipher> {
    cipher: C,
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl Vault<XChaCha20Poly1305Cipher> {
    /// Build a vault from the configured root key.
    ///
    /// Accepts 64 hex characters or a raw 32-byte string. Anything else
    /// (including an empty key) is a [`VaultError::Config`].
    pub fn from_root_key(root_key: &str) -> Result<Self, VaultError> {
        Self::with_cipher(root_key, XChaCha20Poly1305Cipher)
    }
}

impl<C: Cipher> Vault<C> {
    /// Build a vault around an explicit cipher. Key rules match
    /// [`Vault::from_root_key`].
    pub fn with_cipher(root_key: &str, cipher: C) -> Result<Self, VaultError> {
        let key = parse_root_key(root_key)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(cipher = cipher.version_tag(), "vault key loaded");
        Ok(Self { cipher, key })
    }

    /// Encrypt `plaintext` bound to `aad`, returning base64 of
    /// `[version_tag][nonce][ciphertext+tag]`.
    ///
    /// The version tag is authenticated along with `aad`, so every byte of
    /// the blob is covered by the tag.
    pub fn encrypt_string(&self, plaintext: &str, aad: &str) -> Result<String, VaultError> {
        let version = self.cipher.version_tag();
        let encrypted = self
            .cipher
            .encrypt(&self.key, plaintext.as_bytes(), &bound_aad(version, aad))?;

        let mut blob = Vec::with_capacity(1 + encrypted.len());
        blob.push(version);
        blob.extend_from_slice(&encrypted);

        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt_string`](Self::encrypt_string).
    pub fn decrypt_string(&self, b64: &str, aad: &str) -> Result<String, VaultError> {
        let result = self.decrypt_inner(b64, aad);
        if let Err(ref e) = result {
            #[cfg(feature = "tracing")]
            tracing::warn!(kind = e.kind(), aad, "vault decrypt failed");
            #[cfg(feature = "metrics")]
            counter!(vault_metrics::DECRYPT_FAILURES_TOTAL, "kind" => e.kind()).increment(1);
            #[cfg(not(any(feature = "tracing", feature = "metrics")))]
            let _ = e;
        }
        result
    }

    fn decrypt_inner(&self, b64: &str, aad: &str) -> Result<String, VaultError> {
        let blob = base64::engine::general_purpose::STANDARD.decode(b64.trim())?;
        let Some((&version, rest)) = blob.split_first() else {
            return Err(VaultError::Format("empty blob".into()));
        };
        // The cipher rejects short blobs first; after that any altered byte,
        // the version tag included, fails authentication.
        let plaintext = Zeroizing::new(self.cipher.decrypt(&self.key, rest, &bound_aad(version, aad))?);
        if version != self.cipher.version_tag() {
            return Err(VaultError::Integrity);
        }
        String::from_utf8(plaintext.to_vec()).map_err(|e| VaultError::Format(e.to_string()))
    }
}

/// AEAD associated data: the blob's version tag followed by the caller's context.
fn bound_aad(version: u8, aad: &str) -> Vec<u8> {
    let mut bound = Vec::with_capacity(1 + aad.len());
    bound.push(version);
    bound.extend_from_slice(aad.as_bytes());
    bound
}

/// Generate an opaque webhook secret: 24 random bytes as 48 lowercase hex chars.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh root key as 64 lowercase hex chars.
#[must_use]
pub fn generate_root_key() -> String {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut bytes[..]);
    hex::encode(&bytes[..])
}

fn parse_root_key(raw: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(VaultError::Config("root key is not set".into()));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    if raw.len() == KEY_LEN * 2 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode_to_slice(raw, key.as_mut_slice())
            .map_err(|e| VaultError::Config(format!("invalid hex root key: {e}")))?;
        return Ok(key);
    }
    if raw.len() == KEY_LEN {
        key.copy_from_slice(raw.as_bytes());
        return Ok(key);
    }

    Err(VaultError::Config(format!(
        "root key must be {KEY_LEN} bytes (or {} hex chars), got {} bytes",
        KEY_LEN * 2,
        raw.len()
    )))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, std::collections::HashSet};

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn vault() -> Vault {
        Vault::from_root_key(HEX_KEY).unwrap()
    }

    #[test]
    fn encrypt_decrypt_string() {
        let vault = vault();
        let blob = vault
            .encrypt_string("7000000001:AAE-bot-token", "binding:acme:telegram")
            .unwrap();
        assert!(!blob.contains("AAE-bot-token"));

        let plain = vault.decrypt_string(&blob, "binding:acme:telegram").unwrap();
        assert_eq!(plain, "7000000001:AAE-bot-token");
    }

    #[test]
    fn raw_32_byte_key_accepted() {
        let vault = Vault::from_root_key("0123456789abcdef0123456789ABCDEF").unwrap();
        let blob = vault.encrypt_string("x", "").unwrap();
        assert_eq!(vault.decrypt_string(&blob, "").unwrap(), "x");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("too-short-key")]
    #[case("0123456789abcdef0123456789abcdef0")]
    #[case("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e")]
    fn bad_root_key_is_config_error(#[case] key: &str) {
        let err = Vault::from_root_key(key).err().unwrap();
        assert!(matches!(err, VaultError::Config(_)), "{key:?}: {err}");
    }

    #[test]
    fn blob_from_other_binding_fails() {
        let vault = vault();
        let blob = vault.encrypt_string("token", "binding:a:telegram").unwrap();
        let err = vault
            .decrypt_string(&blob, "binding:b:telegram")
            .unwrap_err();
        assert!(matches!(err, VaultError::Integrity));
    }

    #[test]
    fn different_key_fails_integrity() {
        let blob = vault().encrypt_string("token", "").unwrap();
        let other = Vault::from_root_key(&"ab".repeat(32)).unwrap();
        assert!(matches!(
            other.decrypt_string(&blob, "").unwrap_err(),
            VaultError::Integrity
        ));
    }

    #[test]
    fn any_flipped_bit_in_blob_fails_integrity() {
        let vault = vault();
        let blob = vault.encrypt_string("token", "aad").unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(&blob)
            .unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let tampered = base64::engine::general_purpose::STANDARD.encode(tampered);
                let err = vault.decrypt_string(&tampered, "aad").unwrap_err();
                assert!(matches!(err, VaultError::Integrity), "byte {byte} bit {bit}: {err}");
            }
        }
    }

    #[test]
    fn version_tag_is_authenticated() {
        let vault = vault();
        let blob = vault.encrypt_string("token", "aad").unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&blob)
            .unwrap();
        raw[0] = 0x07;
        let relabelled = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(matches!(
            vault.decrypt_string(&relabelled, "aad").unwrap_err(),
            VaultError::Integrity
        ));
    }

    struct RefusingCipher;

    impl Cipher for RefusingCipher {
        fn version_tag(&self) -> u8 {
            0x09
        }

        fn encrypt(
            &self,
            _key: &[u8; 32],
            _plaintext: &[u8],
            _aad: &[u8],
        ) -> Result<Vec<u8>, VaultError> {
            Err(VaultError::Encryption("sealed shut".into()))
        }

        fn decrypt(
            &self,
            _key: &[u8; 32],
            _blob: &[u8],
            _aad: &[u8],
        ) -> Result<Vec<u8>, VaultError> {
            Err(VaultError::Integrity)
        }
    }

    #[test]
    fn seal_failure_is_an_encryption_error() {
        let vault = Vault::with_cipher(HEX_KEY, RefusingCipher).unwrap();
        let err = vault.encrypt_string("token", "aad").unwrap_err();
        assert!(matches!(err, VaultError::Encryption(_)));
        assert_eq!(err.kind(), "encryption");
        assert!(matches!(
            Vault::with_cipher("short", RefusingCipher),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn malformed_blobs_are_format_errors() {
        let vault = vault();

        assert!(matches!(
            vault.decrypt_string("", "").unwrap_err(),
            VaultError::Format(_)
        ));
        assert!(matches!(
            vault.decrypt_string("not base64!!", "").unwrap_err(),
            VaultError::Base64(_)
        ));
        let short = base64::engine::general_purpose::STANDARD.encode([0x01u8; 10]);
        assert!(matches!(
            vault.decrypt_string(&short, "").unwrap_err(),
            VaultError::Format(_)
        ));
        let truncated = base64::engine::general_purpose::STANDARD.encode([0x07u8; 40]);
        assert!(matches!(
            vault.decrypt_string(&truncated, "").unwrap_err(),
            VaultError::Format(_)
        ));
    }

    #[test]
    fn secrets_are_fixed_length_hex_and_distinct() {
        let secrets: HashSet<String> = (0..256).map(|_| generate_secret()).collect();
        assert_eq!(secrets.len(), 256);
        for s in &secrets {
            assert_eq!(s.len(), SECRET_BYTES * 2);
            assert!(s.bytes().all(|b| b.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn generated_root_key_opens_a_vault() {
        let key = generate_root_key();
        assert_eq!(key.len(), 64);
        assert_ne!(key, generate_root_key());
        let vault = Vault::from_root_key(&key).unwrap();
        let blob = vault.encrypt_string("123:tok", "binding:acme:telegram").unwrap();
        assert_eq!(
            vault.decrypt_string(&blob, "binding:acme:telegram").unwrap(),
            "123:tok"
        );
    }
}
