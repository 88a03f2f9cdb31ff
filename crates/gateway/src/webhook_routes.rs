//! Inbound webhook endpoints.
//!
//! `/webhook` and `/webhook/log` serve channel bots that run outside the
//! gateway and call back with the binding's secret in `X-Bot-Token`.
//! `/webhook/telegram` receives Bot API updates directly.

use std::{sync::Arc, time::Duration};

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    serde::{Deserialize, Serialize},
    therra_channels::{ChannelType, NewExchange},
    therra_telegram::{SECRET_HEADER, webhook::parse_update_json},
    tracing::{debug, warn},
};

use crate::{
    auth_middleware::{BOT_TOKEN_HEADER, TENANT_HEADER, header_str},
    error::Error,
    state::GatewayState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub channel: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayResponse {
    pub response: String,
    pub intent: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    pub channel: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_message: Option<String>,
    pub bot_response: Option<String>,
    pub intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramQuery {
    pub tenant: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_channel(raw: Option<&str>) -> Option<ChannelType> {
    raw.and_then(|c| c.parse().ok())
}

/// `POST /webhook`: authenticate, classify and complete. Does not persist;
/// callers report the exchange through `/webhook/log`.
pub async fn relay_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<RelayRequest>,
) -> Response {
    let channel = parse_channel(body.channel.as_deref());
    let ctx = match state
        .auth
        .authenticate(
            header_str(&headers, BOT_TOKEN_HEADER),
            header_str(&headers, TENANT_HEADER),
            channel,
        )
        .await
    {
        Ok(ctx) => ctx,
        Err(e @ Error::Unauthorized { .. }) => return e.into_response(),
        Err(e) => {
            let status = e.status();
            return (
                status,
                Json(serde_json::json!({
                    "response": state.pipeline.config().system_error_message,
                    "error": e.to_string(),
                })),
            )
                .into_response();
        },
    };

    let (Some(customer_name), Some(message)) = (non_empty(body.customer_name), non_empty(body.message))
    else {
        return Error::BadRequest("Missing required fields".into()).into_response();
    };
    if channel.is_none() {
        return Error::BadRequest("Missing required fields".into()).into_response();
    }
    debug!(
        tenant_id = %ctx.tenant_id,
        channel = %ctx.channel,
        has_phone = body.customer_phone.is_some(),
        "relay request"
    );

    let reply = state
        .pipeline
        .reply(&customer_name, ctx.channel, &message)
        .await;
    Json(RelayResponse {
        response: reply.text,
        intent: reply.intent.as_str().to_string(),
    })
    .into_response()
}

/// `POST /webhook/log`: append one exchange reported by an external bot.
pub async fn log_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<LogRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    let channel = parse_channel(body.channel.as_deref());
    let ctx = state
        .auth
        .authenticate(
            header_str(&headers, BOT_TOKEN_HEADER),
            header_str(&headers, TENANT_HEADER),
            channel,
        )
        .await?;

    let (Some(inbound_text), Some(outbound_text)) =
        (non_empty(body.customer_message), non_empty(body.bot_response))
    else {
        return Err(Error::BadRequest("Missing required fields".into()));
    };

    let entry = NewExchange {
        tenant_id: Some(ctx.tenant_id),
        channel: ctx.channel,
        customer_name: non_empty(body.customer_name).unwrap_or_else(|| "Customer".into()),
        customer_id: non_empty(body.customer_phone).unwrap_or_default(),
        inbound_text,
        outbound_text,
        intent: non_empty(body.intent).unwrap_or_else(|| "general".into()),
    };

    let timeout = Duration::from_secs(state.pipeline.config().persist_timeout_secs.max(1));
    match tokio::time::timeout(timeout, state.exchange_log.append(entry)).await {
        Ok(Ok(_)) => Ok(Json(serde_json::json!({"success": true}))),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to log message");
            Err(Error::Persistence("Failed to log message".into()))
        },
        Err(_) => {
            warn!("logging message timed out");
            Err(Error::Persistence("Failed to log message".into()))
        },
    }
}

/// `POST /webhook/telegram`: ack immediately, run the pipeline in the background.
pub async fn telegram_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<TelegramQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    let ctx = state
        .auth
        .authenticate(
            header_str(&headers, SECRET_HEADER),
            query.tenant.as_deref(),
            Some(ChannelType::Telegram),
        )
        .await?;

    match parse_update_json(&body) {
        Ok(Some(parsed)) => {
            let pipeline = Arc::clone(&state.pipeline);
            let message = parsed.into_inbound(ctx.tenant_id);
            tokio::spawn(async move {
                pipeline.handle_inbound(message).await;
            });
        },
        Ok(None) => {},
        Err(e) => warn!(tenant_id = %ctx.tenant_id, error = %e, "unreadable telegram update"),
    }

    Ok((StatusCode::OK, Json(serde_json::json!({"ok": true}))))
}
