use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// No active binding exists for the (tenant, channel) pair.
    #[error("no active {channel} binding for tenant {tenant_id}")]
    UnknownBinding { tenant_id: String, channel: String },

    /// Operation is currently unavailable (session not open, not configured).
    #[error("channel operation unavailable: {message}")]
    Unavailable { message: String },

    /// The stored credential could not be decrypted.
    #[error("channel credential unreadable: {message}")]
    Credential { message: String },

    /// The backing store failed.
    #[error("store operation failed: {context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Wrapped source error from a channel provider API.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_binding(tenant_id: impl std::fmt::Display, channel: impl std::fmt::Display) -> Self {
        Self::UnknownBinding {
            tenant_id: tenant_id.to_string(),
            channel: channel.to_string(),
        }
    }

    #[must_use]
    pub fn credential(message: impl std::fmt::Display) -> Self {
        Self::Credential {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn persistence(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
