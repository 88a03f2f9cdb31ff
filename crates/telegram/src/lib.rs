//! Telegram channel adapter.
//!
//! Telegram is webhook-driven: provisioning verifies the bot token with
//! `getMe` and registers `setWebhook` with the binding's secret as the
//! `secret_token`, Telegram then POSTs updates to the gateway carrying that
//! secret in a header. Replies go out through the Bot API with the
//! credential decrypted per send.

pub mod bot;
pub mod config;
pub mod error;
pub mod outbound;
pub mod webhook;

#[cfg(test)]
pub(crate) mod mock_api;

pub use {
    bot::{BotIdentity, register_webhook, verify_bot},
    config::TelegramConfig,
    error::{Error, Result},
    outbound::TelegramOutbound,
    webhook::{ParsedMessage, SECRET_HEADER, parse_update},
};
