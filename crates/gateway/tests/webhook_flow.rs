//! End-to-end tests: the real router on a local port, driven with reqwest.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    axum::{Json, Router, body::Bytes, http::Uri, routing::post},
    secrecy::Secret,
    serde_json::{Value, json},
    sqlx::SqlitePool,
    therra_agents::{ChatMessage, CompletionResponse, LlmProvider, Usage},
    therra_channels::{ChannelOutbound, ChannelReplyTarget, ChannelType},
    therra_config::PipelineConfig,
    therra_gateway::{
        build_gateway_app,
        exchange_log_store::SqliteExchangeLog,
        pipeline::MessagePipeline,
        registry::TenantRegistry,
        run_migrations,
        state::{GatewaySettings, GatewayState},
        tenant_store::SqliteBindingStore,
    },
    therra_telegram::TelegramConfig,
    therra_vault::Vault,
    tokio::net::TcpListener,
};

const ADMIN_TOKEN: &str = "admin-token";

struct CannedProvider;

#[async_trait]
impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    fn id(&self) -> &str {
        "canned-model"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> therra_agents::Result<CompletionResponse> {
        Ok(CompletionResponse {
            text: "Kami buka setiap hari pukul 08.00 - 21.00.".into(),
            usage: Usage::default(),
        })
    }
}

#[derive(Default)]
struct RecordingOutbound {
    sent: Mutex<Vec<(ChannelReplyTarget, String)>>,
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> therra_channels::Result<()> {
        self.sent.lock().unwrap().push((to.clone(), text.to_string()));
        Ok(())
    }
}

struct Harness {
    base: String,
    pool: SqlitePool,
    registry: Arc<TenantRegistry>,
    outbound: Arc<RecordingOutbound>,
    client: reqwest::Client,
}

async fn start(telegram: TelegramConfig) -> Harness {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let vault = Arc::new(Vault::from_root_key(&"ab".repeat(32)).unwrap());
    let registry = Arc::new(TenantRegistry::new(
        Arc::new(SqliteBindingStore::new(pool.clone())),
        vault,
    ));
    let exchange_log = Arc::new(SqliteExchangeLog::new(pool.clone()));
    let outbound = Arc::new(RecordingOutbound::default());
    let pipeline = Arc::new(MessagePipeline::new(
        Arc::new(CannedProvider),
        exchange_log.clone(),
        outbound.clone(),
        PipelineConfig::default(),
    ));
    let settings = GatewaySettings {
        version: "test".into(),
        public_url: "https://bot.example.com/".into(),
        admin_token: Some(Secret::new(ADMIN_TOKEN.to_string())),
        telegram,
    };
    let state = GatewayState::new(
        settings,
        pool.clone(),
        Arc::clone(&registry),
        pipeline,
        exchange_log,
    );

    let app = build_gateway_app(Arc::new(state));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        base: format!("http://{addr}"),
        pool,
        registry,
        outbound,
        client: reqwest::Client::new(),
    }
}

async fn log_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM bot_logs")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn telegram_update(text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": 42, "type": "private", "first_name": "Budi"},
            "from": {"id": 42, "is_bot": false, "first_name": "Budi"},
            "text": text
        }
    })
}

#[tokio::test]
async fn relay_classifies_and_replies_without_logging() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:tok", None)
        .await
        .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook", h.base))
        .header("X-Bot-Token", &secret)
        .header("X-Tenant-Id", "acme")
        .json(&json!({
            "channel": "telegram",
            "customerName": "Budi",
            "customerPhone": "42",
            "message": "jam buka berapa"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["intent"], "business_hours");
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert_eq!(log_count(&h.pool).await, 0);
}

#[tokio::test]
async fn relay_requires_message() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Whatsapp, "62811", None)
        .await
        .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook", h.base))
        .header("X-Bot-Token", &secret)
        .json(&json!({"channel": "whatsapp", "customerName": "Budi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn telegram_update_runs_pipeline_end_to_end() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:tok", Some("acme_bot".into()))
        .await
        .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook/telegram?tenant=acme", h.base))
        .header("X-Telegram-Bot-Api-Secret-Token", &secret)
        .json(&telegram_update("jam buka berapa"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"ok": true}));

    for _ in 0..250 {
        let sent = !h.outbound.sent.lock().unwrap().is_empty();
        if sent && log_count(&h.pool).await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let sent = h.outbound.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChannelReplyTarget {
        tenant_id: "acme".into(),
        channel: ChannelType::Telegram,
        chat_id: "42".into(),
    });
    assert!(!sent[0].1.is_empty());

    assert_eq!(log_count(&h.pool).await, 1);
    let (tenant, intent): (String, String) =
        sqlx::query_as("SELECT tenant_id, intent FROM bot_logs")
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert_eq!(tenant, "acme");
    assert_eq!(intent, "business_hours");
}

#[tokio::test]
async fn non_text_update_is_acknowledged() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:tok", None)
        .await
        .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook/telegram?tenant=acme", h.base))
        .header("X-Telegram-Bot-Api-Secret-Token", &secret)
        .json(&json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "date": 1700000000,
                "chat": {"id": 42, "type": "private", "first_name": "Budi"},
                "from": {"id": 42, "is_bot": false, "first_name": "Budi"},
                "location": {"latitude": -6.2, "longitude": 106.8}
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.outbound.sent.lock().unwrap().is_empty());
    assert_eq!(log_count(&h.pool).await, 0);
}

#[tokio::test]
async fn rejected_requests_run_no_business_logic() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:tok", None)
        .await
        .unwrap();

    let cases = [
        (None, Some("acme")),
        (Some("not-the-secret"), Some("acme")),
        (Some(secret.as_str()), Some("someone-else")),
    ];
    for (token, tenant) in cases {
        let mut req = h
            .client
            .post(format!("{}/webhook/telegram", h.base))
            .json(&telegram_update("halo"));
        if let Some(token) = token {
            req = req.header("X-Telegram-Bot-Api-Secret-Token", token);
        }
        if let Some(tenant) = tenant {
            req = req.query(&[("tenant", tenant)]);
        }
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(
            resp.json::<Value>().await.unwrap(),
            json!({"error": "not authenticated"})
        );
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.outbound.sent.lock().unwrap().is_empty());
    assert_eq!(log_count(&h.pool).await, 0);
}

#[tokio::test]
async fn rotation_invalidates_old_secret_immediately() {
    let h = start(TelegramConfig::default()).await;
    let old = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:old", None)
        .await
        .unwrap();
    let new = h
        .registry
        .upsert_binding("acme", ChannelType::Telegram, "123:new", None)
        .await
        .unwrap();

    let relay = |secret: String| {
        h.client
            .post(format!("{}/webhook", h.base))
            .header("X-Bot-Token", secret)
            .json(&json!({"channel": "telegram", "customerName": "Budi", "message": "halo"}))
            .send()
    };
    assert_eq!(relay(old).await.unwrap().status(), 401);
    assert_eq!(relay(new).await.unwrap().status(), 200);
}

#[tokio::test]
async fn shared_secret_is_rejected_as_ambiguous() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Whatsapp, "62811", None)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO tenant_channel_bindings
         (tenant_id, channel, encrypted_credential, webhook_secret, status, created_at, updated_at)
         VALUES ('intruder', 'whatsapp', 'x', ?, 'active', 0, 0)",
    )
    .bind(&secret)
    .execute(&h.pool)
    .await
    .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook", h.base))
        .header("X-Bot-Token", &secret)
        .json(&json!({"channel": "whatsapp", "customerName": "Budi", "message": "halo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The tenant-qualified path is unaffected.
    let resp = h
        .client
        .post(format!("{}/webhook", h.base))
        .header("X-Bot-Token", &secret)
        .header("X-Tenant-Id", "acme")
        .json(&json!({"channel": "whatsapp", "customerName": "Budi", "message": "halo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn log_endpoint_appends_reported_exchange() {
    let h = start(TelegramConfig::default()).await;
    let secret = h
        .registry
        .upsert_binding("acme", ChannelType::Whatsapp, "62811", None)
        .await
        .unwrap();

    let resp = h
        .client
        .post(format!("{}/webhook/log", h.base))
        .header("X-Bot-Token", &secret)
        .header("X-Tenant-Id", "acme")
        .json(&json!({
            "channel": "whatsapp",
            "customerName": "Siti",
            "customerPhone": "62812",
            "customerMessage": "ada promo?",
            "botResponse": "Ada diskon 10%.",
            "intent": "promo_inquiry"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"success": true}));

    let logs: Value = h
        .client
        .get(format!("{}/api/tenants/acme/logs", h.base))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["intent"], "promo_inquiry");
    assert_eq!(logs[0]["customer_id"], "62812");
}

#[tokio::test]
async fn health_reports_store() {
    let h = start(TelegramConfig::default()).await;
    let body: Value = reqwest::get(format!("{}/health", h.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["version"], "test");
    assert!(body["timestamp"].as_str().is_some());
}

// ── Provisioning ─────────────────────────────────────────────────────────────

/// (Bot API method, raw request body).
type Captured = Arc<Mutex<Vec<(String, String)>>>;

/// Minimal Bot API stand-in answering getMe and setWebhook.
async fn mock_bot_api() -> (TelegramConfig, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let app = Router::new().route(
        "/{*path}",
        post(move |uri: Uri, body: Bytes| {
            let sink = Arc::clone(&sink);
            async move {
                let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
                let raw = String::from_utf8_lossy(&body).into_owned();
                sink.lock().unwrap().push((method.clone(), raw));
                let result = if method == "GetMe" {
                    json!({
                        "id": 7000000001u64,
                        "is_bot": true,
                        "first_name": "Acme Shop",
                        "username": "acme_bot",
                        "can_join_groups": true,
                        "can_read_all_group_messages": false,
                        "supports_inline_queries": false,
                        "can_connect_to_business": false,
                        "has_main_web_app": false
                    })
                } else {
                    json!(true)
                };
                Json(json!({"ok": true, "result": result}))
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (
        TelegramConfig {
            api_url: Some(format!("http://{addr}/")),
            request_timeout_secs: 5,
        },
        captured,
    )
}

#[tokio::test]
async fn provisioning_requires_admin_token() {
    let h = start(TelegramConfig::default()).await;
    let url = format!("{}/api/tenants/acme/channels/telegram", h.base);

    let resp = h
        .client
        .post(&url)
        .json(&json!({"credential": "123:tok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = h
        .client
        .post(&url)
        .bearer_auth("wrong")
        .json(&json!({"credential": "123:tok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(
        h.registry
            .get_active("acme", ChannelType::Telegram)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn provisioning_telegram_registers_webhook_with_new_secret() {
    let (telegram, captured) = mock_bot_api().await;
    let h = start(telegram).await;
    let url = format!("{}/api/tenants/acme/channels/telegram", h.base);

    let resp = h
        .client
        .post(&url)
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"credential": "123:tok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tenantId"], "acme");
    assert_eq!(body["externalBotId"], "acme_bot");
    assert_eq!(body["status"], "active");
    assert!(body.get("webhookSecret").is_none());

    let binding = h
        .registry
        .get_active("acme", ChannelType::Telegram)
        .await
        .unwrap()
        .unwrap();
    let calls = captured.lock().unwrap().clone();
    let (_, set_webhook) = calls
        .iter()
        .find(|(method, _)| method == "SetWebhook")
        .expect("setWebhook called");
    assert!(set_webhook.contains("https://bot.example.com/webhook/telegram?tenant=acme"));
    assert!(set_webhook.contains(&binding.webhook_secret));
    assert!(calls.iter().any(|(method, _)| method == "GetMe"));

    let resp = h
        .client
        .delete(&url)
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap()["status"], "disabled");

    let resp = h
        .client
        .delete(&url)
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn provisioning_rejects_bad_tenant_and_missing_sessions() {
    let h = start(TelegramConfig::default()).await;

    let resp = h
        .client
        .post(format!("{}/api/tenants/bad.tenant/channels/telegram", h.base))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"credential": "123:tok"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = h
        .client
        .post(format!("{}/api/tenants/acme/channels/whatsapp", h.base))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"credential": "62811"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}
