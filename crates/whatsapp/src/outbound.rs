use {
    async_trait::async_trait,
    therra_channels::{ChannelOutbound, ChannelReplyTarget},
    tracing::warn,
};

use crate::{manager::SessionManager, types::SessionKey};

/// Routes replies through the tenant's live WhatsApp session.
pub struct WhatsAppOutbound {
    sessions: SessionManager,
}

impl WhatsAppOutbound {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl ChannelOutbound for WhatsAppOutbound {
    async fn send_text(&self, to: &ChannelReplyTarget, text: &str) -> therra_channels::Result<()> {
        let key = SessionKey::new(to.tenant_id.clone(), to.channel);
        self.sessions
            .send_text(&key, &to.chat_id, text)
            .await
            .map_err(|e| {
                warn!(session = %key, error = %e, "whatsapp send failed");
                e.into()
            })
    }
}
