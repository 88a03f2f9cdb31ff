use std::{fmt, str::FromStr};

use {
    async_trait::async_trait,
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Chat transports a tenant can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Whatsapp,
    Telegram,
}

impl ChannelType {
    pub const ALL: [ChannelType; 2] = [ChannelType::Whatsapp, ChannelType::Telegram];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
        }
    }

    /// Whether the channel needs a long-lived session owned by the session manager.
    #[must_use]
    pub fn is_persistent_session(self) -> bool {
        matches!(self, Self::Whatsapp)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" | "wa" => Ok(Self::Whatsapp),
            "telegram" | "tg" => Ok(Self::Telegram),
            other => Err(Error::invalid_input(format!("unknown channel: {other}"))),
        }
    }
}

/// A text message received from a customer on a bound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub channel: ChannelType,
    /// Phone number / JID for WhatsApp, chat id for Telegram.
    pub customer_id: String,
    pub customer_name: String,
    pub text: String,
}

impl InboundMessage {
    #[must_use]
    pub fn reply_target(&self) -> ChannelReplyTarget {
        ChannelReplyTarget {
            tenant_id: self.tenant_id.clone(),
            channel: self.channel,
            chat_id: self.customer_id.clone(),
        }
    }
}

/// Where to send a reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelReplyTarget {
    pub tenant_id: String,
    pub channel: ChannelType,
    pub chat_id: String,
}

/// Events emitted by channel adapters and the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelEvent {
    InboundMessage {
        tenant_id: String,
        channel: ChannelType,
        customer_id: String,
    },
    /// A session moved to a new lifecycle state.
    SessionStateChanged {
        tenant_id: String,
        channel: ChannelType,
        state: String,
    },
    /// The remote revoked the session. Needs re-provisioning.
    SessionTerminal {
        tenant_id: String,
        channel: ChannelType,
        reason: String,
    },
}

/// Sink for channel events. The gateway provides the concrete implementation.
#[async_trait]
pub trait ChannelEventSink: Send + Sync {
    /// Report a lifecycle event (logged, counted, surfaced to the tenant admin).
    async fn emit(&self, event: ChannelEvent);

    /// Hand an inbound customer message to the message pipeline.
    async fn dispatch_inbound(&self, message: InboundMessage);
}

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> Result<()>;
}

/// Decrypted access to a binding's channel credential.
///
/// Implemented by the tenant registry; adapters call it per send so a
/// rotated credential takes effect without a restart.
#[async_trait]
pub trait BindingCredentials: Send + Sync {
    async fn credential(&self, tenant_id: &str, channel: ChannelType) -> Result<Secret<String>>;
}
