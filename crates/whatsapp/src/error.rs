use std::path::PathBuf;

use crate::types::SessionKey;

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No open session exists for the key.
    #[error("whatsapp session {0} is not connected")]
    NotConnected(SessionKey),

    /// The remote refused the stored credentials. Not retried.
    #[error("whatsapp session unauthorized: {0}")]
    Unauthorized(String),

    #[error("sidecar transport error: {0}")]
    Transport(String),

    /// The sidecar did not complete the handshake in time. Retried.
    #[error("sidecar handshake timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The binding's phone credential could not be loaded.
    #[error(transparent)]
    Credential(#[from] therra_channels::Error),

    #[error("sidecar websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("session store I/O failed at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tenant or channel cannot be used as a path component.
    #[error("invalid session key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Vault(#[from] therra_vault::VaultError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<SessionError> for therra_channels::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected(key) => Self::unavailable(format!("session {key} is not open")),
            SessionError::InvalidKey(message) => Self::invalid_input(message),
            SessionError::Vault(e) => Self::credential(e),
            SessionError::Credential(inner) => inner,
            other => Self::external("whatsapp session", other),
        }
    }
}
