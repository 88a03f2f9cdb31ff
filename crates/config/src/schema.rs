//! Config schema types.
//!
//! Secrets are `Secret<String>` and are never serialized back out, so a
//! config dump (e.g. `therra check-config`) cannot leak them.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::error::{ConfigError, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PROVIDER_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct:free";
pub const DEFAULT_REFERER: &str = "https://therra-bot.railway.app";
pub const DEFAULT_TITLE: &str = "Therra UMKM Bot";
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Maaf, saya sedang mengalami gangguan. Silakan hubungi admin atau coba lagi nanti.";
pub const DEFAULT_SYSTEM_ERROR_MESSAGE: &str = "Maaf, terjadi kesalahan sistem. Silakan coba lagi.";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TherraConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
    pub sessions: SessionsConfig,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Externally reachable base URL, used when registering provider webhooks.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://therra.db?mode=rwc".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// 32-byte root key, raw or as 64 hex chars.
    #[serde(skip_serializing)]
    pub root_key: Option<Secret<String>>,
}

/// OpenAI-compatible completion endpoint (OpenRouter by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_PROVIDER_URL.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
            referer: DEFAULT_REFERER.into(),
            title: DEFAULT_TITLE.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reply sent when the provider fails, returns nothing or is not configured.
    pub fallback_message: String,
    /// Reply returned by the relay endpoint on unexpected internal errors.
    pub system_error_message: String,
    pub persist_timeout_secs: u64,
    pub dispatch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_message: DEFAULT_FALLBACK_MESSAGE.into(),
            system_error_message: DEFAULT_SYSTEM_ERROR_MESSAGE.into(),
            persist_timeout_secs: 5,
            dispatch_timeout_secs: 15,
        }
    }
}

/// Persistent-session channels (WhatsApp).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Directory holding encrypted session blobs, one per (tenant, channel).
    pub dir: PathBuf,
    /// WebSocket URL of the WhatsApp sidecar.
    pub sidecar_url: String,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// A connection open at least this long resets the backoff.
    pub healthy_after_secs: u64,
    /// Bound on the sidecar WebSocket handshake.
    pub connect_timeout_secs: u64,
    /// Restart active WhatsApp bindings on boot.
    pub resume_on_start: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./auth"),
            sidecar_url: "ws://127.0.0.1:3020".into(),
            backoff_min_secs: 2,
            backoff_max_secs: 60,
            healthy_after_secs: 120,
            connect_timeout_secs: 15,
            resume_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token for the provisioning API. Provisioning is disabled when unset.
    #[serde(skip_serializing)]
    pub admin_token: Option<Secret<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl TherraConfig {
    /// Checks that startup requirements hold.
    ///
    /// The root key is required; its length is enforced by the vault itself.
    /// A missing provider key is allowed and degrades to fallback replies.
    pub fn validate(&self) -> Result<()> {
        match &self.vault.root_key {
            Some(k) if !k.expose_secret().trim().is_empty() => {},
            _ => return Err(ConfigError::Missing("vault.root_key (ENCRYPTION_KEY)")),
        }
        if let Some(url) = &self.server.public_url {
            url::Url::parse(url).map_err(|e| ConfigError::Invalid {
                field: "server.public_url",
                message: e.to_string(),
            })?;
        }
        if self.sessions.backoff_min_secs == 0
            || self.sessions.backoff_min_secs > self.sessions.backoff_max_secs
        {
            return Err(ConfigError::Invalid {
                field: "sessions.backoff_min_secs",
                message: "must be non-zero and not above backoff_max_secs".into(),
            });
        }
        if self.sessions.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sessions.connect_timeout_secs",
                message: "must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Base URL for inbound provider webhooks, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.bind, self.server.port),
        }
    }
}
