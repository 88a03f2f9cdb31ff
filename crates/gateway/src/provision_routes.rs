//! Tenant provisioning API. Every route sits behind [`require_admin`].
//!
//! [`require_admin`]: crate::auth_middleware::require_admin

use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    serde::{Deserialize, Serialize},
    therra_channels::{ChannelType, ExchangeLogEntry},
    therra_telegram::{register_webhook, verify_bot},
    therra_whatsapp::{SessionError, SessionKey},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    state::GatewayState,
};

const MAX_TENANT_ID_LEN: usize = 64;
const DEFAULT_LOG_LIMIT: u32 = 50;
const MAX_LOG_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    /// Bot token for Telegram, phone number for WhatsApp.
    pub credential: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResponse {
    pub tenant_id: String,
    pub channel: ChannelType,
    pub external_bot_id: Option<String>,
    pub status: String,
    /// Live session state, for channels that hold one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// Unix ms at which the remote revoked the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_revoked_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

/// Tenant ids end up in URLs, AADs and session file names.
pub fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    let valid = !tenant_id.is_empty()
        && tenant_id.len() <= MAX_TENANT_ID_LEN
        && tenant_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "tenant id must be 1-{MAX_TENANT_ID_LEN} characters of [A-Za-z0-9_-]"
        )))
    }
}

fn parse_path(tenant_id: &str, channel: &str) -> Result<ChannelType> {
    validate_tenant_id(tenant_id)?;
    channel
        .parse()
        .map_err(|_| Error::BadRequest(format!("unknown channel: {channel}")))
}

/// `POST /api/tenants/{tenant}/channels/{channel}`: create or rotate a binding.
pub async fn upsert_handler(
    State(state): State<Arc<GatewayState>>,
    Path((tenant_id, channel)): Path<(String, String)>,
    Json(body): Json<ProvisionRequest>,
) -> Result<Json<BindingResponse>> {
    let channel = parse_path(&tenant_id, &channel)?;
    let credential = body.credential.trim();
    if credential.is_empty() {
        return Err(Error::BadRequest("credential is required".into()));
    }

    let external_bot_id = match channel {
        ChannelType::Telegram => Some(provision_telegram(&state, &tenant_id, credential).await?),
        ChannelType::Whatsapp => {
            provision_whatsapp(&state, &tenant_id, credential).await?;
            None
        },
    };

    info!(tenant_id, %channel, "channel provisioned");
    Ok(Json(BindingResponse {
        tenant_id,
        channel,
        external_bot_id,
        status: "active".into(),
        session_state: None,
        session_revoked_at: None,
    }))
}

async fn provision_telegram(state: &GatewayState, tenant_id: &str, token: &str) -> Result<String> {
    let identity = verify_bot(token, &state.telegram).await.map_err(|e| {
        warn!(tenant_id, error = %e, "telegram token rejected");
        Error::Upstream(format!("telegram token check failed: {e}"))
    })?;
    let external_id = identity.external_id();

    let secret = state
        .registry
        .upsert_binding(tenant_id, ChannelType::Telegram, token, Some(external_id.clone()))
        .await?;

    let url = format!("{}/webhook/telegram?tenant={tenant_id}", state.public_url);
    register_webhook(token, &url, &secret, &state.telegram)
        .await
        .map_err(|e| {
            warn!(tenant_id, error = %e, "telegram webhook registration failed");
            Error::Upstream(format!("telegram setWebhook failed: {e}"))
        })?;
    Ok(external_id)
}

async fn provision_whatsapp(state: &GatewayState, tenant_id: &str, phone: &str) -> Result<()> {
    let Some(sessions) = &state.sessions else {
        return Err(Error::Unavailable("whatsapp sessions are not enabled".into()));
    };
    let key = SessionKey::whatsapp(tenant_id);
    let session_err = |e: SessionError| Error::from(therra_channels::Error::from(e));

    // The new number pairs from scratch. Discarding first also waits out any
    // terminal cleanup still running for the old session.
    sessions.discard_session(&key).await.map_err(session_err)?;
    state
        .registry
        .upsert_binding(tenant_id, ChannelType::Whatsapp, phone, None)
        .await?;
    sessions.start_session(key).await.map_err(session_err)?;
    Ok(())
}

/// `DELETE /api/tenants/{tenant}/channels/{channel}`.
pub async fn disable_handler(
    State(state): State<Arc<GatewayState>>,
    Path((tenant_id, channel)): Path<(String, String)>,
) -> Result<Json<BindingResponse>> {
    let channel = parse_path(&tenant_id, &channel)?;
    let existing = state.registry.get_active(&tenant_id, channel).await?;
    let Some(existing) = existing else {
        return Err(Error::NotFound(format!("no active {channel} binding for {tenant_id}")));
    };
    state.registry.disable_binding(&tenant_id, channel).await?;

    if channel.is_persistent_session()
        && let Some(sessions) = &state.sessions
    {
        sessions
            .stop_session(&SessionKey::new(tenant_id.as_str(), channel))
            .await;
    }

    Ok(Json(BindingResponse {
        tenant_id,
        channel,
        external_bot_id: existing.external_bot_id,
        status: "disabled".into(),
        session_state: None,
        session_revoked_at: existing.session_revoked_at,
    }))
}

/// `GET /api/tenants/{tenant}/channels/{channel}`: the active binding and,
/// for session channels, whether the session is live or was revoked.
pub async fn status_handler(
    State(state): State<Arc<GatewayState>>,
    Path((tenant_id, channel)): Path<(String, String)>,
) -> Result<Json<BindingResponse>> {
    let channel = parse_path(&tenant_id, &channel)?;
    let Some(binding) = state.registry.get_active(&tenant_id, channel).await? else {
        return Err(Error::NotFound(format!("no active {channel} binding for {tenant_id}")));
    };

    let session_state = match &state.sessions {
        Some(sessions) if channel.is_persistent_session() => sessions
            .state(&SessionKey::new(tenant_id.as_str(), channel))
            .await
            .map(|s| s.as_str().to_string()),
        _ => None,
    };

    Ok(Json(BindingResponse {
        tenant_id,
        channel,
        external_bot_id: binding.external_bot_id,
        status: binding.status.as_str().into(),
        session_state,
        session_revoked_at: binding.session_revoked_at,
    }))
}

/// `GET /api/tenants/{tenant}/logs?limit=`: newest exchanges first.
pub async fn logs_handler(
    State(state): State<Arc<GatewayState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<ExchangeLogEntry>>> {
    validate_tenant_id(&tenant_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let entries = state.exchange_log.list_by_tenant(&tenant_id, limit).await?;
    Ok(Json(entries))
}
