//! Gateway: HTTP server, tenant registry, auth gate and message pipeline.
//!
//! Lifecycle:
//! 1. Load + validate config, open the vault
//! 2. Open the store and run migrations
//! 3. Build the session manager, outbound adapters and pipeline
//! 4. Resume WhatsApp sessions for active, unrevoked bindings
//! 5. Serve webhooks and the provisioning API until shutdown
//!
//! Channel transports live in `therra-telegram` and `therra-whatsapp`; the
//! gateway wires them to the pipeline through `therra-channels` traits.

pub mod auth_middleware;
pub mod channel_events;
pub mod error;
pub mod exchange_log_store;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
pub mod pipeline;
pub mod provision_routes;
pub mod registry;
pub mod server;
pub mod state;
pub mod tenant_store;
pub mod webhook_routes;

pub use {
    error::{Error, Result},
    server::{build_gateway_app, start_gateway},
};

/// Run database migrations for the gateway tables.
///
/// Creates `tenant_channel_bindings` and `bot_logs`. Missing migrations are
/// ignored so an older binary can open a newer database.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
