//! OpenRouter provider (OpenAI-compatible Chat Completions).

use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, histogram, labels, provider as provider_metrics};

use {
    crate::{
        error::{ProviderError, Result},
        model::{ChatMessage, CompletionResponse, LlmProvider, Usage},
    },
    therra_config::ProviderConfig,
};

const PROVIDER_NAME: &str = "openrouter";

pub struct OpenRouterProvider {
    api_key: Option<Secret<String>>,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    referer: String,
    title: String,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Build from config. A missing API key is allowed; every call then fails
    /// with [`ProviderError::NotConfigured`].
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(ProviderError::Http)?;
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty());
        if api_key.is_none() {
            warn!("no completion API key configured, replies will use the fallback message");
        }
        Ok(Self {
            api_key,
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            referer: cfg.referer.clone(),
            title: cfg.title.clone(),
            client,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            messages.iter().map(ChatMessage::to_openai_value).collect();
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<CompletionResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ProviderError::NotConfigured("provider.api_key (OPENROUTER_API_KEY)"))?;

        let body = self.request_body(messages);
        debug!(model = %self.model, messages_count = messages.len(), "openrouter complete request");

        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, model = %self.model, body = %body, "openrouter API error");
            return Err(ProviderError::Status { status, body });
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "openrouter raw response");

        parse_completion(&resp)
    }
}

fn parse_completion(resp: &serde_json::Value) -> Result<CompletionResponse> {
    if resp.get("choices").is_none() {
        return Err(ProviderError::Decode("missing choices".into()));
    }
    let text = resp["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::EmptyReply)?
        .to_string();

    let tokens = |key: &str| {
        resp["usage"][key]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    Ok(CompletionResponse {
        text,
        usage: Usage {
            input_tokens: tokens("prompt_tokens"),
            output_tokens: tokens("completion_tokens"),
        },
    })
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse> {
        let start = Instant::now();
        let result = self.send(messages).await;

        #[cfg(feature = "metrics")]
        {
            counter!(provider_metrics::COMPLETIONS_TOTAL).increment(1);
            histogram!(provider_metrics::COMPLETION_DURATION_SECONDS)
                .record(start.elapsed().as_secs_f64());
            if let Err(ref e) = result {
                counter!(provider_metrics::COMPLETION_ERRORS_TOTAL, labels::ERROR_TYPE => e.kind())
                    .increment(1);
            }
        }
        if let Ok(ref resp) = result {
            debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                input_tokens = resp.usage.input_tokens,
                output_tokens = resp.usage.output_tokens,
                "openrouter completion"
            );
        }
        result
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::{Router, extract::Request, http::StatusCode, routing::post};

    #[derive(Default, Clone)]
    struct CapturedRequest {
        headers: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    }

    async fn start_mock(
        status: StatusCode,
        response_body: serde_json::Value,
    ) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
        let captured: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();

        let app = Router::new().route(
            "/chat/completions",
            post(move |req: Request| {
                let cap = captured_clone.clone();
                let resp = response_body.clone();
                async move {
                    let headers: Vec<(String, String)> = req
                        .headers()
                        .iter()
                        .map(|(k, v)| {
                            (k.as_str().to_string(), v.to_str().unwrap_or("").to_string())
                        })
                        .collect();
                    let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
                        .await
                        .unwrap_or_default();
                    let body = serde_json::from_slice(&body_bytes).ok();
                    cap.lock().unwrap().push(CapturedRequest { headers, body });
                    (status, axum::Json(resp))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn provider(base_url: &str, key: Option<&str>) -> OpenRouterProvider {
        let cfg = ProviderConfig {
            api_key: key.map(|k| Secret::new(k.to_string())),
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        OpenRouterProvider::from_config(&cfg).unwrap()
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 7}
        })
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("persona"), ChatMessage::user("jam buka?")]
    }

    #[tokio::test]
    async fn sends_headers_and_parameters() {
        let (base_url, captured) = start_mock(StatusCode::OK, ok_body("Buka jam 8")).await;
        let resp = provider(&base_url, Some("sk-or-test"))
            .complete(&messages())
            .await
            .unwrap();
        assert_eq!(resp.text, "Buka jam 8");
        assert_eq!(resp.usage.input_tokens, 42);

        let reqs = captured.lock().unwrap();
        let req = &reqs[0];
        let header = |name: &str| {
            req.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(header("authorization").as_deref(), Some("Bearer sk-or-test"));
        assert_eq!(
            header("http-referer").as_deref(),
            Some("https://therra-bot.railway.app")
        );
        assert_eq!(header("x-title").as_deref(), Some("Therra UMKM Bot"));

        let body = req.body.as_ref().unwrap();
        assert_eq!(body["model"], "meta-llama/llama-3.1-8b-instruct:free");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "jam buka?");
    }

    #[tokio::test]
    async fn non_success_is_status_error() {
        let (base_url, _) = start_mock(
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({"error": {"message": "rate limited"}}),
        )
        .await;
        let err = provider(&base_url, Some("k"))
            .complete(&messages())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status, .. } if status == 429));
    }

    #[tokio::test]
    async fn missing_key_never_calls_out() {
        let (base_url, captured) = start_mock(StatusCode::OK, ok_body("x")).await;
        let err = provider(&base_url, None)
            .complete(&messages())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_content_is_empty_reply() {
        let (base_url, _) = start_mock(StatusCode::OK, ok_body("   ")).await;
        let err = provider(&base_url, Some("k"))
            .complete(&messages())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyReply));
    }

    #[test]
    fn parse_rejects_non_completion_json() {
        let err = parse_completion(&serde_json::json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
