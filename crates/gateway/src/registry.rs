//! Tenant registry: (tenant, channel) → encrypted credential + webhook secret.

use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::Secret,
    therra_channels::{
        BindingCredentials, BindingStatus, BindingStore, ChannelType, TenantChannelBinding,
    },
    therra_vault::{Vault, VaultError, generate_secret},
    tracing::{error, info, instrument, warn},
};

#[cfg(feature = "metrics")]
use therra_metrics::{counter, labels, provisioning as provisioning_metrics};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no active binding")]
    NotFound,

    /// More than one active binding carries the presented secret.
    #[error("webhook secret matches {count} active bindings")]
    Ambiguous { count: usize },

    #[error("webhook secret does not match the binding")]
    SecretMismatch,

    #[error(transparent)]
    Store(#[from] therra_channels::Error),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

/// AAD binding a credential ciphertext to its owner.
pub fn binding_aad(tenant_id: &str, channel: ChannelType) -> String {
    format!("binding:{tenant_id}:{channel}")
}

/// Compare without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

pub struct TenantRegistry {
    store: Arc<dyn BindingStore>,
    vault: Arc<Vault>,
}

impl TenantRegistry {
    pub fn new(store: Arc<dyn BindingStore>, vault: Arc<Vault>) -> Self {
        Self { store, vault }
    }

    /// Find the single active binding carrying `secret`.
    #[instrument(skip_all)]
    pub async fn resolve_by_secret(&self, secret: &str) -> Result<TenantChannelBinding> {
        let mut matches = self.store.find_active_by_secret(secret).await?;
        match matches.len() {
            0 => Err(RegistryError::NotFound),
            1 => Ok(matches.remove(0)),
            count => {
                let tenants: Vec<_> = matches.iter().map(|b| b.tenant_id.as_str()).collect();
                error!(count, ?tenants, "webhook secret shared by several active bindings");
                Err(RegistryError::Ambiguous { count })
            },
        }
    }

    #[instrument(skip(self, presented))]
    pub async fn resolve_by_tenant_and_channel(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        presented: &str,
    ) -> Result<TenantChannelBinding> {
        let binding = self
            .store
            .get_active(tenant_id, channel)
            .await?
            .ok_or(RegistryError::NotFound)?;
        if !constant_time_eq(&binding.webhook_secret, presented) {
            return Err(RegistryError::SecretMismatch);
        }
        Ok(binding)
    }

    /// Store `credential` for (tenant, channel) under a fresh webhook secret.
    ///
    /// The previous row, and with it the previous secret and any session
    /// revocation mark, is replaced in the same transaction. Returns the new
    /// secret.
    #[instrument(skip(self, credential))]
    pub async fn upsert_binding(
        &self,
        tenant_id: &str,
        channel: ChannelType,
        credential: &str,
        external_bot_id: Option<String>,
    ) -> Result<String> {
        let encrypted_credential = self
            .vault
            .encrypt_string(credential, &binding_aad(tenant_id, channel))?;
        let webhook_secret = generate_secret();
        let now = chrono::Utc::now().timestamp_millis();

        self.store
            .replace(&TenantChannelBinding {
                tenant_id: tenant_id.to_string(),
                channel,
                encrypted_credential,
                external_bot_id,
                webhook_secret: webhook_secret.clone(),
                status: BindingStatus::Active,
                session_revoked_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(tenant_id, %channel, "binding provisioned");
        #[cfg(feature = "metrics")]
        counter!(provisioning_metrics::BINDINGS_UPSERTED_TOTAL, labels::CHANNEL => channel.as_str())
            .increment(1);
        Ok(webhook_secret)
    }

    /// Move the binding to `disabled`. Returns whether an active binding existed.
    pub async fn disable_binding(&self, tenant_id: &str, channel: ChannelType) -> Result<bool> {
        let changed = self
            .store
            .set_status(tenant_id, channel, BindingStatus::Disabled)
            .await?;
        if changed {
            info!(tenant_id, %channel, "binding disabled");
            #[cfg(feature = "metrics")]
            counter!(provisioning_metrics::BINDINGS_DISABLED_TOTAL, labels::CHANNEL => channel.as_str())
                .increment(1);
        }
        Ok(changed)
    }

    /// Flag the active binding's channel session as revoked by the remote.
    /// It stays out of session resumption until the next upsert.
    pub async fn mark_session_revoked(&self, tenant_id: &str, channel: ChannelType) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        let changed = self
            .store
            .mark_session_revoked(tenant_id, channel, now)
            .await?;
        if changed {
            warn!(tenant_id, %channel, "channel session revoked, binding needs re-provisioning");
        }
        Ok(changed)
    }

    pub async fn get_active(
        &self,
        tenant_id: &str,
        channel: ChannelType,
    ) -> Result<Option<TenantChannelBinding>> {
        Ok(self.store.get_active(tenant_id, channel).await?)
    }

    pub async fn list_active(&self, channel: Option<ChannelType>) -> Result<Vec<TenantChannelBinding>> {
        Ok(self.store.list_active(channel).await?)
    }

    /// Decrypt the credential of the active binding.
    pub async fn credential(&self, tenant_id: &str, channel: ChannelType) -> Result<Secret<String>> {
        let binding = self
            .store
            .get_active(tenant_id, channel)
            .await?
            .ok_or(RegistryError::NotFound)?;
        let plaintext = self.vault.decrypt_string(
            &binding.encrypted_credential,
            &binding_aad(tenant_id, channel),
        )?;
        Ok(Secret::new(plaintext))
    }
}

#[async_trait]
impl BindingCredentials for TenantRegistry {
    async fn credential(
        &self,
        tenant_id: &str,
        channel: ChannelType,
    ) -> therra_channels::Result<Secret<String>> {
        TenantRegistry::credential(self, tenant_id, channel)
            .await
            .map_err(|e| match e {
                RegistryError::Store(inner) => inner,
                RegistryError::Vault(v) => therra_channels::Error::credential(v),
                _ => therra_channels::Error::unknown_binding(tenant_id, channel),
            })
    }
}
