use std::sync::Arc;

use {
    secrecy::Secret, sqlx::SqlitePool, therra_channels::ExchangeLog,
    therra_telegram::TelegramConfig, therra_whatsapp::SessionManager,
};

use crate::{auth_middleware::AuthGate, pipeline::MessagePipeline, registry::TenantRegistry};

/// Settings the HTTP layer needs beyond its services.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub version: String,
    /// Base URL provider webhooks are registered against, no trailing slash.
    pub public_url: String,
    pub admin_token: Option<Secret<String>>,
    pub telegram: TelegramConfig,
}

/// Shared state behind every route.
pub struct GatewayState {
    pub version: String,
    pub public_url: String,
    pub admin_token: Option<Secret<String>>,
    pub telegram: TelegramConfig,
    pub pool: SqlitePool,
    pub registry: Arc<TenantRegistry>,
    pub auth: AuthGate,
    pub pipeline: Arc<MessagePipeline>,
    pub exchange_log: Arc<dyn ExchangeLog>,
    /// WhatsApp sessions. `None` disables WhatsApp provisioning.
    pub sessions: Option<SessionManager>,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<therra_metrics::MetricsHandle>,
}

impl GatewayState {
    pub fn new(
        settings: GatewaySettings,
        pool: SqlitePool,
        registry: Arc<TenantRegistry>,
        pipeline: Arc<MessagePipeline>,
        exchange_log: Arc<dyn ExchangeLog>,
    ) -> Self {
        Self {
            version: settings.version,
            public_url: settings.public_url.trim_end_matches('/').to_string(),
            admin_token: settings.admin_token,
            telegram: settings.telegram,
            pool,
            auth: AuthGate::new(Arc::clone(&registry)),
            registry,
            pipeline,
            exchange_log,
            sessions: None,
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    pub fn with_sessions(mut self, sessions: SessionManager) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: therra_metrics::MetricsHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
