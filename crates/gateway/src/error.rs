use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::registry::RegistryError;

/// Errors surfaced at the HTTP edge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Auth gate rejection. The reason is logged, never returned.
    #[error("not authenticated ({reason})")]
    Unauthorized { reason: &'static str },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A stored credential failed to decrypt.
    #[error("credential integrity: {0}")]
    Credential(String),

    /// Telegram or another provider API refused the request.
    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("store unavailable: {0}")]
    Persistence(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn unauthorized(reason: &'static str) -> Self {
        Self::Unauthorized { reason }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Credential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => Self::unauthorized("no_binding"),
            RegistryError::Ambiguous { .. } => Self::unauthorized("ambiguous_secret"),
            RegistryError::SecretMismatch => Self::unauthorized("secret_mismatch"),
            RegistryError::Store(e) => e.into(),
            RegistryError::Vault(therra_vault::VaultError::Config(msg)) => Self::Config(msg),
            RegistryError::Vault(therra_vault::VaultError::Encryption(msg)) => Self::Internal(msg),
            RegistryError::Vault(e) => Self::Credential(e.kind().to_string()),
        }
    }
}

impl From<therra_channels::Error> for Error {
    fn from(err: therra_channels::Error) -> Self {
        use therra_channels::Error as ChannelError;
        match err {
            ChannelError::InvalidInput { message } => Self::BadRequest(message),
            ChannelError::UnknownBinding { .. } => Self::NotFound(err.to_string()),
            ChannelError::Unavailable { message } => Self::Unavailable(message),
            ChannelError::Credential { message } => Self::Credential(message),
            ChannelError::Persistence { .. } => Self::Persistence(err.to_string()),
            ChannelError::External { .. } | ChannelError::SerdeJson(_) => {
                Self::Upstream(err.to_string())
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthorized { .. } => serde_json::json!({"error": "not authenticated"}),
            Self::Credential(kind) => {
                serde_json::json!({"error": "credential integrity", "kind": kind})
            },
            Self::Config(_) => serde_json::json!({"error": "server misconfigured"}),
            Self::Internal(_) => serde_json::json!({"error": "internal error"}),
            other => serde_json::json!({"error": other.to_string()}),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}
