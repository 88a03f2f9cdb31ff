use {
    teloxide::types::{Update, UpdateKind},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, telegram as tg_metrics};

use {
    crate::error::{Error, Result},
    therra_channels::{ChannelType, InboundMessage},
};

/// Header Telegram uses to echo the webhook `secret_token`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// The parts of a text update the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub chat_id: i64,
    pub customer_name: String,
    pub text: String,
}

impl ParsedMessage {
    #[must_use]
    pub fn into_inbound(self, tenant_id: impl Into<String>) -> InboundMessage {
        InboundMessage {
            tenant_id: tenant_id.into(),
            channel: ChannelType::Telegram,
            customer_id: self.chat_id.to_string(),
            customer_name: self.customer_name,
            text: self.text,
        }
    }
}

/// Extract a customer text message. Anything else (edits, media, service
/// messages, callback queries) yields `None` and is acknowledged unprocessed.
#[must_use]
pub fn parse_update(update: &Update) -> Option<ParsedMessage> {
    let UpdateKind::Message(msg) = &update.kind else {
        debug!(update_id = update.id.0, "ignoring non-message telegram update");
        return None;
    };
    let text = msg.text()?.trim();
    if text.is_empty() {
        return None;
    }

    let customer_name = msg
        .from
        .as_ref()
        .and_then(|u| {
            if u.first_name.trim().is_empty() {
                u.username.clone()
            } else {
                Some(u.first_name.clone())
            }
        })
        .unwrap_or_else(|| "Customer".to_string());

    Some(ParsedMessage {
        chat_id: msg.chat.id.0,
        customer_name,
        text: text.to_string(),
    })
}

/// Decode a raw webhook body and extract the message, if any.
pub fn parse_update_json(body: &[u8]) -> Result<Option<ParsedMessage>> {
    #[cfg(feature = "metrics")]
    counter!(tg_metrics::UPDATES_RECEIVED_TOTAL).increment(1);

    let update: Update = serde_json::from_slice(body)
        .map_err(|e| Error::message(format!("invalid telegram update: {e}")))?;
    Ok(parse_update(&update))
}
