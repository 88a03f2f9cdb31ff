//! Message pipeline: classify → complete → persist → dispatch.
//!
//! Only classification and completion sit on the reply path. Persistence
//! runs in a spawned task and dispatch failures are reported, so neither
//! can take the reply away from the customer.

use std::{sync::Arc, time::Duration};

use {
    therra_agents::{ChatMessage, LlmProvider, ProviderError, build_system_prompt},
    therra_channels::{ChannelOutbound, ChannelType, ExchangeLog, InboundMessage, NewExchange},
    therra_config::PipelineConfig,
    therra_routing::{Intent, classify},
    tokio::task::JoinHandle,
    tracing::{debug, error, info, instrument, warn},
};

#[cfg(feature = "metrics")]
use {
    std::time::Instant,
    therra_metrics::{counter, histogram, labels, persistence as persistence_metrics, pipeline as pipeline_metrics},
};

/// A computed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub intent: Intent,
    pub text: String,
    /// The provider failed and `text` is the fallback message.
    pub fallback: bool,
}

/// Result of running one inbound message end to end.
pub struct PipelineOutcome {
    pub intent: Intent,
    pub reply: String,
    pub fallback: bool,
    pub dispatched: bool,
    /// Resolves to whether the exchange was persisted.
    pub log_task: JoinHandle<bool>,
}

pub struct MessagePipeline {
    provider: Arc<dyn LlmProvider>,
    log: Arc<dyn ExchangeLog>,
    outbound: Arc<dyn ChannelOutbound>,
    config: PipelineConfig,
}

impl MessagePipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        log: Arc<dyn ExchangeLog>,
        outbound: Arc<dyn ChannelOutbound>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            log,
            outbound,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify and complete. Provider failures, blank completions included,
    /// degrade to the fallback text.
    #[instrument(skip(self, customer_name, text), fields(provider = self.provider.name()))]
    pub async fn reply(&self, customer_name: &str, channel: ChannelType, text: &str) -> Reply {
        let intent = classify(text);
        let messages = [
            ChatMessage::system(build_system_prompt(customer_name, channel.as_str())),
            ChatMessage::user(text),
        ];

        let completion = self.provider.complete(&messages).await.and_then(|resp| {
            if resp.text.trim().is_empty() {
                Err(ProviderError::EmptyReply)
            } else {
                Ok(resp.text)
            }
        });
        let (text, fallback) = match completion {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "completion failed, using fallback reply");
                #[cfg(feature = "metrics")]
                counter!(pipeline_metrics::FALLBACK_REPLIES_TOTAL, labels::ERROR_TYPE => e.kind())
                    .increment(1);
                (self.config.fallback_message.clone(), true)
            },
        };
        debug!(intent = %intent, fallback, "reply computed");
        Reply {
            intent,
            text,
            fallback,
        }
    }

    /// Append an exchange in the background, bounded by the persist timeout.
    pub fn persist(&self, entry: NewExchange) -> JoinHandle<bool> {
        let log = Arc::clone(&self.log);
        let timeout = Duration::from_secs(self.config.persist_timeout_secs.max(1));
        tokio::spawn(async move {
            let tenant_id = entry.tenant_id.clone();
            let channel = entry.channel;
            match tokio::time::timeout(timeout, log.append(entry)).await {
                Ok(Ok(id)) => {
                    debug!(id, "exchange logged");
                    true
                },
                Ok(Err(e)) => {
                    error!(tenant_id = ?tenant_id, %channel, error = %e, "failed to persist exchange");
                    #[cfg(feature = "metrics")]
                    counter!(persistence_metrics::LOG_FAILURES_TOTAL, labels::REASON => "error")
                        .increment(1);
                    false
                },
                Err(_) => {
                    error!(tenant_id = ?tenant_id, %channel, "persisting exchange timed out");
                    #[cfg(feature = "metrics")]
                    counter!(persistence_metrics::LOG_FAILURES_TOTAL, labels::REASON => "timeout")
                        .increment(1);
                    false
                },
            }
        })
    }

    /// Run an inbound channel message through the whole pipeline.
    #[instrument(skip(self, message), fields(tenant_id = %message.tenant_id, channel = %message.channel))]
    pub async fn handle_inbound(&self, message: InboundMessage) -> PipelineOutcome {
        #[cfg(feature = "metrics")]
        let started = Instant::now();

        let reply = self
            .reply(&message.customer_name, message.channel, &message.text)
            .await;

        let log_task = self.persist(NewExchange {
            tenant_id: Some(message.tenant_id.clone()),
            channel: message.channel,
            customer_name: message.customer_name.clone(),
            customer_id: message.customer_id.clone(),
            inbound_text: message.text.clone(),
            outbound_text: reply.text.clone(),
            intent: reply.intent.as_str().to_string(),
        });

        let target = message.reply_target();
        let timeout = Duration::from_secs(self.config.dispatch_timeout_secs.max(1));
        let dispatched = match tokio::time::timeout(
            timeout,
            self.outbound.send_text(&target, &reply.text),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "reply dispatch failed");
                false
            },
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "reply dispatch timed out");
                false
            },
        };

        #[cfg(feature = "metrics")]
        {
            counter!(
                pipeline_metrics::MESSAGES_TOTAL,
                labels::CHANNEL => message.channel.as_str(),
                labels::INTENT => reply.intent.as_str()
            )
            .increment(1);
            if !dispatched {
                counter!(pipeline_metrics::DISPATCH_FAILURES_TOTAL, labels::CHANNEL => message.channel.as_str())
                    .increment(1);
            }
            histogram!(pipeline_metrics::DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        }

        info!(intent = %reply.intent, fallback = reply.fallback, dispatched, "inbound message handled");
        PipelineOutcome {
            intent: reply.intent,
            reply: reply.text,
            fallback: reply.fallback,
            dispatched,
            log_task,
        }
    }
}
