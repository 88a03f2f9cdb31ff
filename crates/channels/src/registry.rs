use std::{collections::HashMap, sync::Arc};

use {async_trait::async_trait, tracing::debug};

use crate::{ChannelOutbound, ChannelReplyTarget, ChannelType, Error, Result};

/// Routes outbound sends to the adapter registered for the target's channel.
#[derive(Default, Clone)]
pub struct OutboundRegistry {
    outbounds: HashMap<ChannelType, Arc<dyn ChannelOutbound>>,
}

impl OutboundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: ChannelType, outbound: Arc<dyn ChannelOutbound>) {
        self.outbounds.insert(channel, outbound);
    }

    #[must_use]
    pub fn with(mut self, channel: ChannelType, outbound: Arc<dyn ChannelOutbound>) -> Self {
        self.register(channel, outbound);
        self
    }

    pub fn get(&self, channel: ChannelType) -> Option<&dyn ChannelOutbound> {
        self.outbounds.get(&channel).map(|o| o.as_ref())
    }
}

#[async_trait]
impl ChannelOutbound for OutboundRegistry {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> Result<()> {
        let outbound = self
            .get(to.channel)
            .ok_or_else(|| Error::unavailable(format!("no outbound for {}", to.channel)))?;
        debug!(tenant_id = %to.tenant_id, channel = %to.channel, "routing outbound send");
        outbound.send_text(to, text).await
    }
}
