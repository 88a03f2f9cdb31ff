use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{
        Json, Router,
        extract::State,
        response::IntoResponse,
        routing::{get, post},
    },
    secrecy::ExposeSecret,
    sqlx::SqlitePool,
    therra_agents::{LlmProvider, OpenRouterProvider},
    therra_channels::{ChannelType, ExchangeLog, OutboundRegistry},
    therra_config::TherraConfig,
    therra_telegram::{TelegramConfig, TelegramOutbound},
    therra_vault::Vault,
    therra_whatsapp::{
        BackoffPolicy, FileSessionStore, SessionKey, SessionManager, SidecarConnector,
        WhatsAppOutbound,
    },
    tokio::sync::OnceCell,
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use crate::{
    auth_middleware::require_admin,
    channel_events::GatewayChannelEventSink,
    exchange_log_store::SqliteExchangeLog,
    pipeline::MessagePipeline,
    provision_routes, registry::TenantRegistry,
    state::{GatewaySettings, GatewayState},
    tenant_store::SqliteBindingStore,
    webhook_routes,
};

pub type AppState = Arc<GatewayState>;

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/api/tenants/{tenant}/channels/{channel}",
            get(provision_routes::status_handler)
                .post(provision_routes::upsert_handler)
                .delete(provision_routes::disable_handler),
        )
        .route("/api/tenants/{tenant}/logs", get(provision_routes::logs_handler))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            require_admin,
        ));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_routes::relay_handler))
        .route("/webhook/log", post(webhook_routes::log_handler))
        .route("/webhook/telegram", post(webhook_routes::telegram_handler))
        .merge(admin);

    #[cfg(feature = "prometheus")]
    let router = router.route("/metrics", get(metrics_handler));

    #[cfg(feature = "metrics")]
    let router = router.route_layer(axum::middleware::from_fn(
        crate::metrics_middleware::http_metrics_middleware,
    ));

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Open the store and apply migrations.
pub async fn connect_store(url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(url).await?;
    crate::run_migrations(&pool).await?;
    Ok(pool)
}

/// Start the gateway HTTP server and the session manager.
pub async fn start_gateway(config: TherraConfig, bind: &str, port: u16) -> anyhow::Result<()> {
    config.validate()?;

    let root_key = config
        .vault
        .root_key
        .as_ref()
        .map(|k| k.expose_secret().clone())
        .unwrap_or_default();
    let vault = Arc::new(Vault::from_root_key(&root_key)?);

    let pool = connect_store(&config.database.url).await?;
    let registry = Arc::new(TenantRegistry::new(
        Arc::new(SqliteBindingStore::new(pool.clone())),
        Arc::clone(&vault),
    ));
    let exchange_log: Arc<dyn ExchangeLog> = Arc::new(SqliteExchangeLog::new(pool.clone()));
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenRouterProvider::from_config(&config.provider)?);
    info!(provider = provider.name(), model = provider.id(), "completion provider ready");

    // The session manager needs the event sink before the pipeline exists.
    let pipeline_cell = Arc::new(OnceCell::new());
    let sink = Arc::new(GatewayChannelEventSink::new(
        Arc::clone(&registry),
        Arc::clone(&pipeline_cell),
    ));
    let sessions = SessionManager::new(
        Arc::new(SidecarConnector::new(
            config.sessions.sidecar_url.clone(),
            Duration::from_secs(config.sessions.connect_timeout_secs),
        )),
        Arc::new(FileSessionStore::new(config.sessions.dir.clone(), Arc::clone(&vault))),
        registry.clone(),
        sink,
        BackoffPolicy::from(&config.sessions),
    );

    let telegram = TelegramConfig::default();
    let outbound = OutboundRegistry::new()
        .with(
            ChannelType::Telegram,
            Arc::new(TelegramOutbound::new(registry.clone(), telegram.clone())),
        )
        .with(
            ChannelType::Whatsapp,
            Arc::new(WhatsAppOutbound::new(sessions.clone())),
        );

    let pipeline = Arc::new(MessagePipeline::new(
        provider,
        Arc::clone(&exchange_log),
        Arc::new(outbound),
        config.pipeline.clone(),
    ));
    if pipeline_cell.set(Arc::clone(&pipeline)).is_err() {
        anyhow::bail!("message pipeline initialized twice");
    }

    let settings = GatewaySettings {
        version: env!("CARGO_PKG_VERSION").to_string(),
        public_url: config.public_base_url(),
        admin_token: config.auth.admin_token.clone(),
        telegram,
    };
    if settings.admin_token.is_none() {
        warn!("no admin token configured, provisioning API is disabled");
    }

    let state = GatewayState::new(settings, pool, Arc::clone(&registry), pipeline, exchange_log)
        .with_sessions(sessions.clone());

    #[cfg(feature = "metrics")]
    let state = {
        let handle = therra_metrics::init_metrics(therra_metrics::MetricsRecorderConfig {
            enabled: config.metrics.enabled,
            global_labels: Vec::new(),
        })?;
        state.with_metrics(handle)
    };

    if config.sessions.resume_on_start {
        resume_sessions(&registry, &sessions).await;
    }

    let app = build_gateway_app(Arc::new(state));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, public_url = %config.public_base_url(), "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.stop_all().await;
    info!("gateway stopped");
    Ok(())
}

/// Start a session for every active WhatsApp binding whose session was not
/// revoked. Revoked bindings wait for re-provisioning.
pub async fn resume_sessions(registry: &TenantRegistry, sessions: &SessionManager) {
    let bindings = match registry.list_active(Some(ChannelType::Whatsapp)).await {
        Ok(bindings) => bindings,
        Err(e) => {
            warn!(error = %e, "could not list whatsapp bindings, no sessions resumed");
            return;
        },
    };
    for binding in bindings {
        if let Some(revoked_at) = binding.session_revoked_at {
            warn!(
                tenant_id = %binding.tenant_id,
                revoked_at,
                "session was revoked, waiting for re-provisioning"
            );
            continue;
        }
        let key = SessionKey::new(binding.tenant_id, binding.channel);
        if let Err(e) = sessions.start_session(key.clone()).await {
            warn!(session = %key, error = %e, "failed to resume session");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "connected",
        Err(e) => {
            warn!(error = %e, "health check could not reach the store");
            "disconnected"
        },
    };
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": database,
        "version": state.version,
    }))
}

#[cfg(feature = "prometheus")]
async fn metrics_handler(State(state): State<AppState>) -> axum::response::Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}
