use {async_trait::async_trait, sqlx::SqlitePool};

use therra_channels::{
    BindingStatus, BindingStore, ChannelType, Error, Result, TenantChannelBinding,
};

#[derive(sqlx::FromRow)]
struct BindingRow {
    tenant_id: String,
    channel: String,
    encrypted_credential: String,
    external_bot_id: Option<String>,
    webhook_secret: String,
    status: String,
    session_revoked_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BindingRow> for TenantChannelBinding {
    type Error = Error;

    fn try_from(r: BindingRow) -> Result<Self> {
        Ok(Self {
            tenant_id: r.tenant_id,
            channel: r.channel.parse()?,
            encrypted_credential: r.encrypted_credential,
            external_bot_id: r.external_bot_id,
            webhook_secret: r.webhook_secret,
            status: r.status.parse()?,
            session_revoked_at: r.session_revoked_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT_BINDING: &str = "SELECT tenant_id, channel, encrypted_credential, external_bot_id,
        webhook_secret, status, session_revoked_at, created_at, updated_at
 FROM tenant_channel_bindings";

/// SQLite-backed binding store.
pub struct SqliteBindingStore {
    pool: SqlitePool,
}

impl SqliteBindingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::persistence(context, e)
}

#[async_trait]
impl BindingStore for SqliteBindingStore {
    async fn get_active(
        &self,
        tenant_id: &str,
        channel: ChannelType,
    ) -> Result<Option<TenantChannelBinding>> {
        let row = sqlx::query_as::<_, BindingRow>(&format!(
            "{SELECT_BINDING} WHERE tenant_id = ? AND channel = ? AND status = 'active'"
        ))
        .bind(tenant_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("load binding"))?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_active_by_secret(&self, secret: &str) -> Result<Vec<TenantChannelBinding>> {
        let rows = sqlx::query_as::<_, BindingRow>(&format!(
            "{SELECT_BINDING} WHERE webhook_secret = ? AND status = 'active'"
        ))
        .bind(secret)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("lookup binding by secret"))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn replace(&self, binding: &TenantChannelBinding) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("begin binding upsert"))?;
        sqlx::query(
            r#"INSERT INTO tenant_channel_bindings
                 (tenant_id, channel, encrypted_credential, external_bot_id,
                  webhook_secret, status, session_revoked_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(tenant_id, channel) DO UPDATE SET
                 encrypted_credential = excluded.encrypted_credential,
                 external_bot_id = excluded.external_bot_id,
                 webhook_secret = excluded.webhook_secret,
                 status = excluded.status,
                 session_revoked_at = excluded.session_revoked_at,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&binding.tenant_id)
        .bind(binding.channel.as_str())
        .bind(&binding.encrypted_credential)
        .bind(&binding.external_bot_id)
        .bind(&binding.webhook_secret)
        .bind(binding.status.as_str())
        .bind(binding.session_revoked_at)
        .bind(binding.created_at)
        .bind(binding.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err("upsert binding"))?;
        tx.commit().await.map_err(db_err("commit binding upsert"))?;
        Ok(())
    }

    async fn mark_session_revoked(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tenant_channel_bindings SET session_revoked_at = ?, updated_at = ?
             WHERE tenant_id = ? AND channel = ? AND status = 'active'",
        )
        .bind(at)
        .bind(at)
        .bind(tenant_id)
        .bind(channel.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err("mark session revoked"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        status: BindingStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tenant_channel_bindings SET status = ?, updated_at = ?
             WHERE tenant_id = ? AND channel = ? AND status != ?",
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(tenant_id)
        .bind(channel.as_str())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err("update binding status"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self, channel: Option<ChannelType>) -> Result<Vec<TenantChannelBinding>> {
        let rows = match channel {
            Some(ch) => {
                sqlx::query_as::<_, BindingRow>(&format!(
                    "{SELECT_BINDING} WHERE status = 'active' AND channel = ? ORDER BY tenant_id"
                ))
                .bind(ch.as_str())
                .fetch_all(&self.pool)
                .await
            },
            None => {
                sqlx::query_as::<_, BindingRow>(&format!(
                    "{SELECT_BINDING} WHERE status = 'active' ORDER BY tenant_id, channel"
                ))
                .fetch_all(&self.pool)
                .await
            },
        }
        .map_err(db_err("list bindings"))?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn binding(tenant: &str, channel: ChannelType, secret: &str) -> TenantChannelBinding {
        TenantChannelBinding {
            tenant_id: tenant.into(),
            channel,
            encrypted_credential: "ciphertext".into(),
            external_bot_id: None,
            webhook_secret: secret.into(),
            status: BindingStatus::Active,
            session_revoked_at: None,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn replace_overwrites_and_keeps_created_at() {
        let store = SqliteBindingStore::new(test_pool().await);
        store
            .replace(&binding("acme", ChannelType::Telegram, "s1"))
            .await
            .unwrap();

        let mut second = binding("acme", ChannelType::Telegram, "s2");
        second.created_at = 99;
        second.updated_at = 99;
        second.external_bot_id = Some("acme_bot".into());
        store.replace(&second).await.unwrap();

        let got = store
            .get_active("acme", ChannelType::Telegram)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.webhook_secret, "s2");
        assert_eq!(got.created_at, 1);
        assert_eq!(got.updated_at, 99);
        assert_eq!(got.external_bot_id.as_deref(), Some("acme_bot"));
        assert!(store.find_active_by_secret("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_bindings_are_invisible() {
        let store = SqliteBindingStore::new(test_pool().await);
        store
            .replace(&binding("acme", ChannelType::Whatsapp, "s1"))
            .await
            .unwrap();

        assert!(
            store
                .set_status("acme", ChannelType::Whatsapp, BindingStatus::Disabled)
                .await
                .unwrap()
        );
        assert!(
            !store
                .set_status("acme", ChannelType::Whatsapp, BindingStatus::Disabled)
                .await
                .unwrap()
        );
        assert!(
            store
                .get_active("acme", ChannelType::Whatsapp)
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.find_active_by_secret("s1").await.unwrap().is_empty());
        assert!(store.list_active(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_active_filters_by_channel() {
        let store = SqliteBindingStore::new(test_pool().await);
        store
            .replace(&binding("acme", ChannelType::Whatsapp, "s1"))
            .await
            .unwrap();
        store
            .replace(&binding("acme", ChannelType::Telegram, "s2"))
            .await
            .unwrap();
        store
            .replace(&binding("beta", ChannelType::Whatsapp, "s3"))
            .await
            .unwrap();

        let wa = store.list_active(Some(ChannelType::Whatsapp)).await.unwrap();
        let tenants: Vec<_> = wa.iter().map(|b| b.tenant_id.as_str()).collect();
        assert_eq!(tenants, vec!["acme", "beta"]);
        assert_eq!(store.list_active(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn revoked_session_survives_reads_and_clears_on_replace() {
        let store = SqliteBindingStore::new(test_pool().await);
        store
            .replace(&binding("acme", ChannelType::Whatsapp, "s1"))
            .await
            .unwrap();

        assert!(
            store
                .mark_session_revoked("acme", ChannelType::Whatsapp, 500)
                .await
                .unwrap()
        );
        assert!(
            !store
                .mark_session_revoked("beta", ChannelType::Whatsapp, 500)
                .await
                .unwrap()
        );
        let got = store
            .get_active("acme", ChannelType::Whatsapp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.session_revoked_at, Some(500));
        assert_eq!(got.updated_at, 500);

        store
            .replace(&binding("acme", ChannelType::Whatsapp, "s2"))
            .await
            .unwrap();
        let got = store.list_active(Some(ChannelType::Whatsapp)).await.unwrap();
        assert_eq!(got[0].session_revoked_at, None);
    }
}
