//! Durable storage for the session's two credentials.
//!
//! A store holds at most two entries, keyed by [`ACCESS_TOKEN_KEY`] and
//! [`REFRESH_TOKEN_KEY`]. A missing refresh entry means "logged out".

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use zeroize::Zeroizing;

use crate::secret::SecretString;
use crate::session::Session;

/// Storage key of the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key of the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("credential file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Backend-specific failure for stores that are not file based.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key-value storage for the session credentials.
///
/// `save` replaces both entries at once; an absent credential in the
/// session removes its entry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load whatever was last saved. An empty store yields an empty session.
    async fn load(&self) -> Result<Session, StoreError>;

    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

fn to_entries(session: &Session) -> HashMap<&'static str, SecretString> {
    let mut entries = HashMap::with_capacity(2);
    if let Some(access) = session.access_credential() {
        entries.insert(ACCESS_TOKEN_KEY, access.clone());
    }
    if let Some(refresh) = session.refresh_credential() {
        entries.insert(REFRESH_TOKEN_KEY, refresh.clone());
    }
    entries
}

fn from_entries(mut entries: HashMap<&'static str, SecretString>) -> Session {
    Session::from_parts(
        entries.remove(ACCESS_TOKEN_KEY),
        entries.remove(REFRESH_TOKEN_KEY),
    )
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<&'static str, SecretString>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    #[must_use]
    pub fn with_session(session: &Session) -> Self {
        Self {
            entries: Mutex::new(to_entries(session)),
        }
    }

    /// Raw entry lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SecretString> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Session, StoreError> {
        Ok(from_entries(self.entries.lock().clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        *self.entries.lock() = to_entries(session);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// JSON file store.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so a crash never leaves one credential updated and the other stale.
/// On Unix the file is created with mode `0600`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Session, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => Zeroizing::new(raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no credential file; starting logged out");
                return Ok(Session::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let parsed: HashMap<String, String> =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let entries = parsed
            .into_iter()
            .filter_map(|(key, value)| {
                let value = Zeroizing::new(value);
                let key = match key.as_str() {
                    ACCESS_TOKEN_KEY => ACCESS_TOKEN_KEY,
                    REFRESH_TOKEN_KEY => REFRESH_TOKEN_KEY,
                    _ => return None,
                };
                (!value.is_empty()).then(|| (key, SecretString::new(value.as_str())))
            })
            .collect();
        Ok(from_entries(entries))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut doc = serde_json::Map::new();
        for (key, value) in to_entries(session) {
            doc.insert(key.to_owned(), value.expose().into());
        }
        let json = Zeroizing::new(
            serde_json::to_vec_pretty(&doc).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?,
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // The mode below only applies to a newly created file.
        let tmp = self.path.with_extension("tmp");
        match tokio::fs::remove_file(&tmp).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&tmp).await.map_err(|e| self.io_error(e))?;
        file.write_all(json.as_slice())
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
