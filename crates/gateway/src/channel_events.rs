use std::sync::Arc;

use {
    async_trait::async_trait,
    therra_channels::{ChannelEvent, ChannelEventSink, InboundMessage},
    tokio::sync::OnceCell,
    tracing::{debug, error, info, warn},
};

use crate::{pipeline::MessagePipeline, registry::TenantRegistry};

/// Routes channel adapter and session events into the gateway.
///
/// Holds the pipeline through a deferred `OnceCell` so the sink can be
/// handed to the session manager before the pipeline (which sends through
/// that manager) exists. Terminal sessions are recorded on their binding,
/// which keeps them out of resumption until re-provisioned.
pub struct GatewayChannelEventSink {
    registry: Arc<TenantRegistry>,
    pipeline: Arc<OnceCell<Arc<MessagePipeline>>>,
}

impl GatewayChannelEventSink {
    pub fn new(
        registry: Arc<TenantRegistry>,
        pipeline: Arc<OnceCell<Arc<MessagePipeline>>>,
    ) -> Self {
        Self { registry, pipeline }
    }
}

#[async_trait]
impl ChannelEventSink for GatewayChannelEventSink {
    async fn emit(&self, event: ChannelEvent) {
        match &event {
            ChannelEvent::InboundMessage {
                tenant_id,
                channel,
                customer_id,
            } => {
                debug!(tenant_id, %channel, customer_id, "inbound channel message");
            },
            ChannelEvent::SessionStateChanged {
                tenant_id,
                channel,
                state,
            } => {
                info!(tenant_id, %channel, state, "channel session state changed");
            },
            ChannelEvent::SessionTerminal {
                tenant_id,
                channel,
                reason,
            } => {
                warn!(
                    tenant_id,
                    %channel,
                    reason,
                    event = %serde_json::to_string(&event).unwrap_or_default(),
                    "channel session revoked, tenant must re-provision the binding"
                );
                match self.registry.mark_session_revoked(tenant_id, *channel).await {
                    Ok(true) => {},
                    Ok(false) => debug!(tenant_id, %channel, "no active binding to mark revoked"),
                    Err(e) => error!(tenant_id, %channel, error = %e, "failed to record session revocation"),
                }
            },
        }
    }

    async fn dispatch_inbound(&self, message: InboundMessage) {
        let Some(pipeline) = self.pipeline.get().cloned() else {
            warn!(tenant_id = %message.tenant_id, "pipeline not ready, dropping inbound message");
            return;
        };
        self.emit(ChannelEvent::InboundMessage {
            tenant_id: message.tenant_id.clone(),
            channel: message.channel,
            customer_id: message.customer_id.clone(),
        })
        .await;
        tokio::spawn(async move {
            pipeline.handle_inbound(message).await;
        });
    }
}
