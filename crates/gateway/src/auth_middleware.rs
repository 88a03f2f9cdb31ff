use std::sync::Arc;

use {
    axum::{
        extract::State,
        http::{HeaderMap, Request, StatusCode},
        middleware::Next,
        response::{IntoResponse, Json, Response},
    },
    secrecy::ExposeSecret,
    therra_channels::ChannelType,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use therra_metrics::{auth as auth_metrics, counter, labels};

use crate::{
    error::{Error, Result},
    registry::{RegistryError, TenantRegistry, constant_time_eq},
    state::GatewayState,
};

/// Header carrying the webhook secret on the relay and log endpoints.
pub const BOT_TOKEN_HEADER: &str = "x-bot-token";
/// Optional header naming the tenant on the relay and log endpoints.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// The tenant and channel an authenticated request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub channel: ChannelType,
    pub external_bot_id: Option<String>,
}

/// Authenticates every inbound webhook before any business logic runs.
///
/// Reads only. Store failures are errors, never a pass.
#[derive(Clone)]
pub struct AuthGate {
    registry: Arc<TenantRegistry>,
}

impl AuthGate {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }

    pub async fn authenticate(
        &self,
        presented: Option<&str>,
        tenant_id: Option<&str>,
        channel: Option<ChannelType>,
    ) -> Result<TenantContext> {
        let result = self.check(presented, tenant_id, channel).await;
        match &result {
            Ok(ctx) => {
                debug!(tenant_id = %ctx.tenant_id, channel = %ctx.channel, "webhook authenticated");
                #[cfg(feature = "metrics")]
                counter!(auth_metrics::ACCEPTED_TOTAL, labels::CHANNEL => ctx.channel.as_str())
                    .increment(1);
            },
            Err(Error::Unauthorized { reason }) => {
                warn!(reason, tenant_id = ?tenant_id, "webhook rejected");
                #[cfg(feature = "metrics")]
                {
                    counter!(auth_metrics::REJECTIONS_TOTAL, labels::REASON => *reason).increment(1);
                    if *reason == "ambiguous_secret" {
                        counter!(auth_metrics::AMBIGUOUS_SECRET_TOTAL).increment(1);
                    }
                }
            },
            Err(_) => {},
        }
        result
    }

    async fn check(
        &self,
        presented: Option<&str>,
        tenant_id: Option<&str>,
        channel: Option<ChannelType>,
    ) -> Result<TenantContext> {
        let Some(secret) = presented.map(str::trim).filter(|s| !s.is_empty()) else {
            return Err(Error::unauthorized("missing_secret"));
        };

        let binding = match tenant_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tenant) => {
                let Some(channel) = channel else {
                    return Err(Error::unauthorized("missing_channel"));
                };
                self.registry
                    .resolve_by_tenant_and_channel(tenant, channel, secret)
                    .await?
            },
            None => {
                let binding = self.registry.resolve_by_secret(secret).await?;
                if let Some(channel) = channel
                    && channel != binding.channel
                {
                    return Err(RegistryError::SecretMismatch.into());
                }
                binding
            },
        };

        Ok(TenantContext {
            tenant_id: binding.tenant_id,
            channel: binding.channel,
            external_bot_id: binding.external_bot_id,
        })
    }
}

/// Read a header as trimmed text.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Middleware guarding the provisioning API with the admin bearer token.
///
/// With no admin token configured every request is rejected.
pub async fn require_admin(
    State(state): State<Arc<GatewayState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let presented = header_str(request.headers(), axum::http::header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(expected) = &state.admin_token
        && let Some(presented) = presented
        && constant_time_eq(expected.expose_secret(), presented.trim())
    {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "admin request rejected");
    #[cfg(feature = "metrics")]
    counter!(auth_metrics::REJECTIONS_TOTAL, labels::REASON => "admin_token").increment(1);
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "not authenticated"})),
    )
        .into_response()
}
