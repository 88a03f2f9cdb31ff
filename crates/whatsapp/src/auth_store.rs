//! Durable, encrypted session credential blobs.
//!
//! One file per session at `{dir}/{tenant}/{channel}.json`. Writes go to a
//! sibling temp file and are renamed into place, so a crash mid-write leaves
//! the previous blob intact.

use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};

use {
    serde::{Deserialize, Serialize},
    therra_vault::Vault,
    tracing::debug,
};

use crate::{
    error::{Result, SessionError},
    types::SessionKey,
};

#[derive(Serialize, Deserialize)]
struct StoredSession {
    blob: String,
}

pub struct FileSessionStore {
    dir: PathBuf,
    vault: Arc<Vault>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, vault: Arc<Vault>) -> Self {
        Self {
            dir: dir.into(),
            vault,
        }
    }

    pub fn path_for(&self, key: &SessionKey) -> Result<PathBuf> {
        let tenant = &key.tenant_id;
        if tenant.is_empty()
            || tenant.starts_with('.')
            || tenant.contains(['/', '\\', '\0'])
        {
            return Err(SessionError::InvalidKey(format!("tenant id {tenant:?}")));
        }
        Ok(self
            .dir
            .join(tenant)
            .join(format!("{}.json", key.channel.as_str())))
    }

    /// Load and decrypt the persisted blob, if any.
    pub async fn load(&self, key: &SessionKey) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::store(path, e)),
        };
        let stored: StoredSession = serde_json::from_slice(&raw)?;
        let creds = self.vault.decrypt_string(&stored.blob, &key.aad())?;
        Ok(Some(creds))
    }

    /// Encrypt and atomically replace the blob for `key`.
    pub async fn save(&self, key: &SessionKey, creds: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::store(parent, e))?;
        }
        let stored = StoredSession {
            blob: self.vault.encrypt_string(creds, &key.aad())?,
        };
        let body = serde_json::to_vec(&stored)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| SessionError::store(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::store(&path, e))?;
        debug!(session = %key, "session credentials saved");
        Ok(())
    }

    /// Delete the blob. Missing files are not an error.
    pub async fn remove(&self, key: &SessionKey) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::store(path, e)),
        }
    }
}
