use std::{fmt, str::FromStr};

use {async_trait::async_trait, serde::Serialize};

use crate::{ChannelType, Error, Result};

/// Whether a binding may authenticate inbound calls and send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    Active,
    Disabled,
}

impl BindingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for BindingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::invalid_input(format!("unknown binding status: {other}"))),
        }
    }
}

/// A tenant's credential and webhook secret for one channel.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantChannelBinding {
    pub tenant_id: String,
    pub channel: ChannelType,
    /// Vault ciphertext of the channel credential.
    pub encrypted_credential: String,
    pub external_bot_id: Option<String>,
    pub webhook_secret: String,
    pub status: BindingStatus,
    /// Set when the remote revoked the channel session (logged out). The
    /// binding still authenticates, but its session is not resumed until the
    /// tenant re-provisions.
    pub session_revoked_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl fmt::Debug for TenantChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantChannelBinding")
            .field("tenant_id", &self.tenant_id)
            .field("channel", &self.channel)
            .field("encrypted_credential", &"[REDACTED]")
            .field("external_bot_id", &self.external_bot_id)
            .field("webhook_secret", &"[REDACTED]")
            .field("status", &self.status)
            .field("session_revoked_at", &self.session_revoked_at)
            .finish()
    }
}

/// Persistent storage for tenant channel bindings.
///
/// Bindings are never deleted; [`set_status`](Self::set_status) disables them.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// The active binding for (tenant, channel), if any.
    async fn get_active(
        &self,
        tenant_id: &str,
        channel: ChannelType,
    ) -> Result<Option<TenantChannelBinding>>;

    /// Every active binding carrying `secret`. More than one is a provisioning bug.
    async fn find_active_by_secret(&self, secret: &str) -> Result<Vec<TenantChannelBinding>>;

    /// Insert or fully replace the row for (tenant, channel) in one transaction.
    async fn replace(&self, binding: &TenantChannelBinding) -> Result<()>;

    /// Record that the active binding's session was revoked at `at` (unix ms).
    /// Returns `true` when a row changed.
    async fn mark_session_revoked(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        at: i64,
    ) -> Result<bool>;

    /// Returns `true` when a row changed.
    async fn set_status(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        status: BindingStatus,
    ) -> Result<bool>;

    async fn list_active(&self, channel: Option<ChannelType>) -> Result<Vec<TenantChannelBinding>>;
}
