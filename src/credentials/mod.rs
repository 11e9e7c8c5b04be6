//! Persisted client credentials
//!
//! The store keeps the session token, refresh token, cached profile and
//! user id in a single JSON file. Login and register write it, logout
//! clears it, and the chat session reads it once at start.

use crate::protocol::Profile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Everything the client persists between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<Profile>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// Complete credentials required to open a live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub jwt: String,
    pub refresh_token: String,
    pub profile: Profile,
}

impl StoredSession {
    /// Credentials for a live session, if token, refresh token and profile are all present
    pub fn session_credentials(&self) -> Option<SessionCredentials> {
        match (&self.jwt, &self.refresh_token, &self.user) {
            (Some(jwt), Some(refresh_token), Some(profile))
                if !jwt.is_empty() && !refresh_token.is_empty() =>
            {
                Some(SessionCredentials {
                    jwt: jwt.clone(),
                    refresh_token: refresh_token.clone(),
                    profile: profile.clone(),
                })
            }
            _ => None,
        }
    }

    /// Uid of the logged in user, falling back to the cached profile
    pub fn current_uid(&self) -> Option<&str> {
        self.uid
            .as_deref()
            .or_else(|| self.user.as_ref().map(|p| p.uid.as_str()))
    }
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session; a missing file is an empty session
    pub fn load(&self) -> Result<StoredSession, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored session
    pub fn save(&self, session: &StoredSession) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!("Stored credentials at {:?}", self.path);
        Ok(())
    }

    /// Store a fresh login
    pub fn store_credentials(
        &self,
        jwt: &str,
        refresh_token: &str,
        user: Profile,
        uid: &str,
    ) -> Result<(), CredentialError> {
        self.save(&StoredSession {
            jwt: Some(jwt.to_string()),
            refresh_token: Some(refresh_token.to_string()),
            user: Some(user),
            uid: Some(uid.to_string()),
        })
    }

    /// Update the cached profile, keeping the tokens
    pub fn store_profile(&self, profile: Profile) -> Result<(), CredentialError> {
        let mut session = self.load()?;
        session.user = Some(profile);
        self.save(&session)
    }

    /// Forget everything
    pub fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
