//! Session state: the in-memory token/identity pair and its durable file copy.
//!
//! The store holds both halves of a session in a single slot so they can
//! never drift apart; persistence is a separate collaborator wired in by the
//! binary, keeping the store itself free of I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;
use tracing::warn;

use crate::model::UserProfile;

/// Authenticated session: the credential and the identity it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

/// Process-wide session holder. All access is synchronous.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install credential and identity in one step.
    pub fn set(&self, token: String, user: UserProfile) {
        let mut guard = self.inner.write().expect("session lock");
        *guard = Some(Session { token, user });
    }

    /// Drop credential and identity together. Safe to call when already
    /// logged out.
    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("session lock");
        *guard = None;
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().expect("session lock").clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock")
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().expect("session lock").is_some()
    }
}

/// On-disk record format.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    user: UserProfile,
    saved_at: DateTime<Utc>,
}

/// Durable copy of the session so a login survives process restarts.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file, unreadable content, or an
    /// empty token all count as logged out rather than an error; startup
    /// must never fail on a stale session file.
    pub async fn load(&self) -> Option<Session> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), ?err, "failed to read session file");
                return None;
            }
        };
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) if !stored.token.is_empty() => Some(Session {
                token: stored.token,
                user: stored.user,
            }),
            Ok(_) => None,
            Err(err) => {
                warn!(path = %self.path.display(), ?err, "ignoring corrupt session file");
                None
            }
        }
    }

    pub async fn save(&self, session: &Session) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let stored = StoredSession {
            token: session.token.clone(),
            user: session.user.clone(),
            saved_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&stored).map_err(std::io::Error::from)?;
        fs::write(&self.path, body).await
    }

    /// Delete the stored session. Already gone counts as success.
    pub async fn remove(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
