use std::sync::Arc;

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{
    error::Result,
    types::{SessionEvent, SessionKey},
};

/// Send half of a live connection.
#[async_trait]
pub trait SessionLink: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    /// Drop the connection without logging the device out.
    async fn close(&self);
}

/// A freshly established connection: the link plus its event stream.
///
/// The stream ending without a [`SessionEvent::Closed`] counts as a
/// retryable connection loss.
pub struct Connection {
    pub link: Arc<dyn SessionLink>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// What one connection attempt starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Phone number the binding was provisioned with. Used for pairing when
    /// there is no stored session.
    pub phone: String,
    /// Persisted session blob, when resuming.
    pub creds: Option<String>,
}

/// Opens connections for the session supervisor.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connect `key`, resuming from `request.creds` when a blob was persisted.
    ///
    /// Return [`SessionError::Unauthorized`](crate::SessionError::Unauthorized)
    /// when the remote rejects the credentials outright; any other error is
    /// retried.
    async fn connect(&self, key: &SessionKey, request: ConnectRequest) -> Result<Connection>;
}
