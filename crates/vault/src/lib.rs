//! Credential vault for channel secrets at rest.
//!
//! A single static 32-byte root key (from process configuration) encrypts
//! bot tokens and session blobs with XChaCha20-Poly1305. Each blob is bound
//! to its owner through AAD, so a ciphertext copied between bindings does
//! not decrypt. The [`Cipher`] trait keeps the AEAD backend swappable.

pub mod error;
pub mod traits;
pub mod vault;
pub mod xchacha20;

pub use {
    error::VaultError,
    traits::Cipher,
    vault::{SECRET_BYTES, Vault, generate_root_key, generate_secret},
    xchacha20::XChaCha20Poly1305Cipher,
};
