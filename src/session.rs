//! Device-local session persistence.
//!
//! The session is three keys in a small key-value store: `isLoggedIn`
//! (`"true"` or absent), `userId` and `currentUser` (the JSON-encoded
//! [`User`]). There is no token and no expiry, so a stored session is only as
//! fresh as the login that wrote it.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::User;

pub const KEY_IS_LOGGED_IN: &str = "isLoggedIn";
pub const KEY_USER_ID: &str = "userId";
pub const KEY_CURRENT_USER: &str = "currentUser";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Keeps everything in memory; gone when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Persists entries as a single JSON object on disk. Writes go to a sibling
/// temp file first and are renamed into place.
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    async fn read_entries(&self) -> anyhow::Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.read().await;
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries).await?;
        }
        Ok(())
    }
}

/// The one owner of session state. Screens get the current user from here
/// instead of reading the store themselves.
pub struct SessionContext<S> {
    store: S,
}

impl<S: KeyValueStore> SessionContext<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn save(&self, user: &User) -> anyhow::Result<()> {
        self.store
            .set(KEY_CURRENT_USER, &serde_json::to_string(user)?)
            .await?;
        self.store.set(KEY_USER_ID, &user.id.to_string()).await?;
        self.store.set(KEY_IS_LOGGED_IN, "true").await?;
        debug!(user_id = user.id, "Saved session");
        Ok(())
    }

    /// `None` when nobody is logged in or the stored user can't be read back.
    pub async fn load(&self) -> anyhow::Result<Option<User>> {
        if self.store.get(KEY_IS_LOGGED_IN).await?.as_deref() != Some("true") {
            return Ok(None);
        }

        let Some(raw) = self.store.get(KEY_CURRENT_USER).await? else {
            warn!("Session flagged as logged in but no user is stored");
            return Ok(None);
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!("Discarding unreadable stored user: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        self.store.remove(KEY_IS_LOGGED_IN).await?;
        self.store.remove(KEY_USER_ID).await?;
        self.store.remove(KEY_CURRENT_USER).await?;
        debug!("Cleared session");
        Ok(())
    }
}
