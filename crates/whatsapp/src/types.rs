use std::fmt;

use {
    serde::{Deserialize, Serialize},
    therra_channels::ChannelType,
};

/// Identifies one session: a tenant's binding on a persistent-session channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub tenant_id: String,
    pub channel: ChannelType,
}

impl SessionKey {
    pub fn new(tenant_id: impl Into<String>, channel: ChannelType) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            channel,
        }
    }

    pub fn whatsapp(tenant_id: impl Into<String>) -> Self {
        Self::new(tenant_id, ChannelType::Whatsapp)
    }

    /// AAD binding a persisted session blob to its owner.
    #[must_use]
    pub fn aad(&self) -> String {
        format!("session:{}:{}", self.tenant_id, self.channel)
    }

    /// Identifier sent to the sidecar.
    #[must_use]
    pub fn session_id(&self) -> String {
        format!("{}:{}", self.tenant_id, self.channel)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.channel)
    }
}

/// Lifecycle state of a session.
///
/// `connecting -> open -> {closed_retryable -> connecting, terminal}`.
/// A terminal session is never reconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Open,
    ClosedRetryable,
    Terminal,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedRetryable => "closed_retryable",
            Self::Terminal => "terminal",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The phone unlinked the device.
    LoggedOut,
    /// The remote rejected the credentials.
    Unauthorized,
    /// Anything else: network drop, restart required, sidecar gone.
    ConnectionLost(String),
}

impl CloseReason {
    /// Baileys `DisconnectReason.loggedOut`.
    pub const STATUS_LOGGED_OUT: u16 = 401;
    /// Baileys `DisconnectReason.forbidden`.
    pub const STATUS_FORBIDDEN: u16 = 403;

    /// Map a sidecar close notice to a reason.
    #[must_use]
    pub fn from_sidecar(reason: &str, status_code: Option<u16>) -> Self {
        match (reason, status_code) {
            ("logged_out", _) | (_, Some(Self::STATUS_LOGGED_OUT)) => Self::LoggedOut,
            ("unauthorized" | "forbidden", _) | (_, Some(Self::STATUS_FORBIDDEN)) => {
                Self::Unauthorized
            },
            (other, _) => Self::ConnectionLost(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::Unauthorized)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LoggedOut => "logged_out",
            Self::Unauthorized => "unauthorized",
            Self::ConnectionLost(reason) => reason,
        }
    }
}

/// What a live connection reports to its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Open,
    /// New credential blob. Must be persisted before the next event is handled.
    CredsUpdate(String),
    Inbound {
        from: String,
        name: Option<String>,
        text: String,
    },
    Closed(CloseReason),
}

/// Messages sent to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    Connect {
        session_id: String,
        phone: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        creds: Option<String>,
    },
    Send {
        session_id: String,
        request_id: u64,
        to: String,
        text: String,
    },
    Logout {
        session_id: String,
    },
}

/// Messages received from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Open {
        session_id: String,
        #[serde(default)]
        phone_number: Option<String>,
    },
    CredsUpdate {
        session_id: String,
        creds: String,
    },
    Message {
        session_id: String,
        from: String,
        #[serde(default)]
        push_name: Option<String>,
        text: String,
        #[serde(default)]
        from_me: bool,
    },
    Closed {
        session_id: String,
        reason: String,
        #[serde(default)]
        status_code: Option<u16>,
    },
    Error {
        #[serde(default)]
        session_id: Option<String>,
        error: String,
    },
}

impl SidecarMessage {
    /// Convert to a supervisor event. Returns `None` for frames the
    /// supervisor does not act on (own messages, empty text, errors).
    #[must_use]
    pub fn into_event(self) -> Option<SessionEvent> {
        match self {
            Self::Open { .. } => Some(SessionEvent::Open),
            Self::CredsUpdate { creds, .. } => Some(SessionEvent::CredsUpdate(creds)),
            Self::Message {
                from,
                push_name,
                text,
                from_me,
                ..
            } => {
                if from_me || text.trim().is_empty() {
                    return None;
                }
                Some(SessionEvent::Inbound {
                    from,
                    name: push_name,
                    text,
                })
            },
            Self::Closed {
                reason,
                status_code,
                ..
            } => Some(SessionEvent::Closed(CloseReason::from_sidecar(
                &reason,
                status_code,
            ))),
            Self::Error { .. } => None,
        }
    }
}
