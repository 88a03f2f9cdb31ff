use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bot API client settings shared by every tenant's bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Override of `https://api.telegram.org/`, for self-hosted Bot API servers.
    pub api_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
