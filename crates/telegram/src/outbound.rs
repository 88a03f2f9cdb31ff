use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    teloxide::{prelude::*, types::ChatId},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, telegram as tg_metrics};

use {
    crate::{bot::build_bot, config::TelegramConfig},
    therra_channels::{BindingCredentials, ChannelOutbound, ChannelReplyTarget, ChannelType, Error},
};

/// Telegram caps a text message at 4096 characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Sends replies through the Bot API with the tenant's own bot token.
pub struct TelegramOutbound {
    credentials: Arc<dyn BindingCredentials>,
    config: TelegramConfig,
}

impl TelegramOutbound {
    pub fn new(credentials: Arc<dyn BindingCredentials>, config: TelegramConfig) -> Self {
        Self {
            credentials,
            config,
        }
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> therra_channels::Result<()> {
        let chat_id: i64 = to
            .chat_id
            .parse()
            .map_err(|_| Error::invalid_input(format!("bad telegram chat id: {}", to.chat_id)))?;
        let token = self
            .credentials
            .credential(&to.tenant_id, ChannelType::Telegram)
            .await?;
        let bot = build_bot(token.expose_secret(), &self.config)?;

        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LEN) {
            bot.send_message(ChatId(chat_id), chunk)
                .await
                .map_err(|e| {
                    warn!(tenant_id = %to.tenant_id, chat_id, error = %e, "telegram send failed");
                    Error::external("telegram sendMessage", e)
                })?;
        }

        #[cfg(feature = "metrics")]
        counter!(tg_metrics::MESSAGES_SENT_TOTAL).increment(1);
        debug!(tenant_id = %to.tenant_id, chat_id, "telegram reply sent");
        Ok(())
    }
}

/// Split on char boundaries into chunks of at most `max` chars.
fn split_message(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(max)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
