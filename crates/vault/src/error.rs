//! Vault error types.

/// Errors produced by vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Root key missing or not exactly 32 bytes. Fatal at startup.
    #[error("vault configuration error: {0}")]
    Config(String),

    /// The blob did not authenticate: tampered bytes (version tag included),
    /// wrong key or wrong AAD.
    #[error("ciphertext failed integrity check")]
    Integrity,

    /// The blob is malformed: too short, or not valid UTF-8.
    #[error("malformed ciphertext: {0}")]
    Format(String),

    /// The cipher refused to seal the plaintext.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl VaultError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Integrity => "integrity",
            Self::Format(_) | Self::Base64(_) => "format",
            Self::Encryption(_) => "encryption",
        }
    }
}
