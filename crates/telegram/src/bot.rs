use {
    teloxide::{payloads::SetWebhookSetters, prelude::*, types::AllowedUpdate},
    tracing::{info, warn},
};

use crate::{
    config::TelegramConfig,
    error::{Error, Result},
};

/// Identity reported by `getMe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    pub username: Option<String>,
}

impl BotIdentity {
    /// Stable external id stored on the binding: the username when set.
    #[must_use]
    pub fn external_id(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.id.to_string())
    }
}

pub(crate) fn build_bot(token: &str, config: &TelegramConfig) -> Result<Bot> {
    // teloxide pins its own reqwest major, so its builder error is not ours.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))?;
    let bot = Bot::with_client(token, client);
    match &config.api_url {
        Some(url) => {
            let url = reqwest::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            Ok(bot.set_api_url(url))
        },
        None => Ok(bot),
    }
}

/// Check a bot token against Telegram before storing it.
pub async fn verify_bot(token: &str, config: &TelegramConfig) -> Result<BotIdentity> {
    let bot = build_bot(token, config)?;
    let me = bot.get_me().await?;
    let identity = BotIdentity {
        id: me.id.0,
        username: me.username.clone(),
    };
    info!(bot_id = identity.id, username = ?identity.username, "telegram token verified");
    Ok(identity)
}

/// Point the bot's webhook at `url`, signed with `secret`.
///
/// Telegram echoes `secret` in the `X-Telegram-Bot-Api-Secret-Token` header
/// of every update, which is what the auth gate checks.
pub async fn register_webhook(
    token: &str,
    url: &str,
    secret: &str,
    config: &TelegramConfig,
) -> Result<()> {
    let bot = build_bot(token, config)?;
    let url = reqwest::Url::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    if url.scheme() != "https" {
        warn!(%url, "telegram only delivers webhooks to https urls");
    }
    bot.set_webhook(url.clone())
        .secret_token(secret.to_string())
        .allowed_updates(vec![AllowedUpdate::Message])
        .drop_pending_updates(false)
        .await?;
    info!(%url, "telegram webhook registered");
    Ok(())
}
