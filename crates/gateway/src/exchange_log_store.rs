use {
    async_trait::async_trait,
    sqlx::SqlitePool,
    therra_channels::{Error, ExchangeLog, ExchangeLogEntry, NewExchange, Result},
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, labels, persistence as persistence_metrics};

/// SQLite-backed exchange log (`bot_logs`).
pub struct SqliteExchangeLog {
    pool: SqlitePool,
}

impl SqliteExchangeLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    tenant_id: Option<String>,
    channel: String,
    customer_name: String,
    customer_identifier: String,
    customer_message: String,
    bot_response: String,
    intent: String,
    created_at: i64,
}

#[async_trait]
impl ExchangeLog for SqliteExchangeLog {
    async fn append(&self, entry: NewExchange) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO bot_logs
             (tenant_id, channel, customer_name, customer_identifier,
              customer_message, bot_response, intent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.tenant_id)
        .bind(entry.channel.as_str())
        .bind(&entry.customer_name)
        .bind(&entry.customer_id)
        .bind(&entry.inbound_text)
        .bind(&entry.outbound_text)
        .bind(&entry.intent)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence("append exchange log", e))?;

        #[cfg(feature = "metrics")]
        counter!(persistence_metrics::LOG_WRITES_TOTAL, labels::CHANNEL => entry.channel.as_str())
            .increment(1);
        Ok(result.last_insert_rowid())
    }

    async fn list_by_tenant(&self, tenant_id: &str, limit: u32) -> Result<Vec<ExchangeLogEntry>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT id, tenant_id, channel, customer_name, customer_identifier,
                    customer_message, bot_response, intent, created_at
             FROM bot_logs
             WHERE tenant_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::persistence("list exchange log", e))?;

        rows.into_iter()
            .map(|r| {
                Ok(ExchangeLogEntry {
                    id: r.id,
                    tenant_id: r.tenant_id,
                    channel: r.channel.parse()?,
                    customer_name: r.customer_name,
                    customer_id: r.customer_identifier,
                    inbound_text: r.customer_message,
                    outbound_text: r.bot_response,
                    intent: r.intent,
                    created_at: r.created_at,
                })
            })
            .collect()
    }
}
