use {async_trait::async_trait, serde::Serialize};

use crate::{ChannelType, Result};

/// A completed exchange ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExchange {
    pub tenant_id: Option<String>,
    pub channel: ChannelType,
    pub customer_name: String,
    pub customer_id: String,
    pub inbound_text: String,
    pub outbound_text: String,
    pub intent: String,
}

/// A logged exchange. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeLogEntry {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub channel: ChannelType,
    pub customer_name: String,
    pub customer_id: String,
    pub inbound_text: String,
    pub outbound_text: String,
    pub intent: String,
    pub created_at: i64,
}

/// Append-only log of message round-trips. There is no update or delete path.
#[async_trait]
pub trait ExchangeLog: Send + Sync {
    /// Returns the new row id.
    async fn append(&self, entry: NewExchange) -> Result<i64>;
    async fn list_by_tenant(&self, tenant_id: &str, limit: u32) -> Result<Vec<ExchangeLogEntry>>;
}
