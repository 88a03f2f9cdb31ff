//! In-process stand-in for the Bot API used by unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{StatusCode, Uri},
        routing::post,
    },
    serde_json::{Value, json},
};

use crate::config::TelegramConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramApiMethod {
    GetMe,
    SetWebhook,
    SendMessage,
    Other(String),
}

impl TelegramApiMethod {
    fn from_path(path: &str) -> Self {
        match path.rsplit('/').next().unwrap_or_default() {
            "GetMe" => Self::GetMe,
            "SetWebhook" => Self::SetWebhook,
            "SendMessage" => Self::SendMessage,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: TelegramApiMethod,
    pub path: String,
    /// Parsed JSON body, `Null` for multipart requests.
    pub body: Value,
    pub raw: String,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    authorized: bool,
}

pub struct MockTelegramApi {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockTelegramApi {
    pub async fn start() -> Self {
        Self::spawn(true).await
    }

    pub async fn start_unauthorized() -> Self {
        Self::spawn(false).await
    }

    async fn spawn(authorized: bool) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/{*path}", post(handler))
            .with_state(MockState {
                requests: Arc::clone(&requests),
                authorized,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}/"),
            requests,
        }
    }

    pub fn config(&self) -> TelegramConfig {
        TelegramConfig {
            api_url: Some(self.base_url.clone()),
            request_timeout_secs: 5,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handler(
    State(state): State<MockState>,
    uri: Uri,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let method = TelegramApiMethod::from_path(uri.path());
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        raw: String::from_utf8_lossy(&body).into_owned(),
    });

    if !state.authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
        );
    }

    let result = match method {
        TelegramApiMethod::GetMe => json!({
            "id": 7000000001u64,
            "is_bot": true,
            "first_name": "Acme Shop",
            "username": "acme_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        }),
        TelegramApiMethod::SendMessage => json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 42, "type": "private"},
            "text": "ok"
        }),
        TelegramApiMethod::SetWebhook | TelegramApiMethod::Other(_) => json!(true),
    };
    (StatusCode::OK, Json(json!({"ok": true, "result": result})))
}
