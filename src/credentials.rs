//! OAuth token lifecycle for the Gmail and Drive APIs.
//!
//! The token file uses the authorized-user JSON layout (`token`,
//! `refresh_token`, `client_id`, ...) so it stays readable by other Google
//! tooling. How a fresh token is obtained is delegated to an [`AuthProvider`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatcherError};

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const SCOPES: [&str; 2] = [GMAIL_MODIFY_SCOPE, DRIVE_FILE_SCOPE];

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this window are refreshed early.
const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) <= now,
            None => false,
        }
    }

    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now) && self.has_scopes(&SCOPES)
    }
}

/// Reads and writes the persisted token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file counts as "no token".
    pub fn load(&self) -> Option<Token> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Unable to read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring corrupt token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, token: &Token) -> Result<()> {
        let json = serde_json::to_string(token).map_err(|e| WatcherError::TokenFile {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json).map_err(|e| WatcherError::TokenFile {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;

        debug!("Token persisted to {}", self.path.display());
        Ok(())
    }
}

/// Source of fresh tokens. The pipeline only ever needs a valid token and
/// never sees how it was obtained.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, token: &Token) -> Result<Token>;

    /// Run the full (interactive) login flow.
    async fn login(&self) -> Result<Token>;
}

pub struct CredentialManager {
    store: TokenStore,
    provider: Box<dyn AuthProvider>,
}

impl CredentialManager {
    pub fn new(store: TokenStore, provider: Box<dyn AuthProvider>) -> Self {
        CredentialManager { store, provider }
    }

    /// Return a usable token, refreshing or logging in when needed.
    ///
    /// The token file is rewritten after every successful refresh or login
    /// and left untouched when the stored token is still valid.
    pub async fn acquire(&self) -> Result<Token> {
        let now = Utc::now();
        let mut current = self.store.load();

        if let Some(token) = &current {
            if token.is_valid(now) {
                debug!("Using stored token (expires {:?})", token.expiry);
                return Ok(token.clone());
            }
            if !token.has_scopes(&SCOPES) {
                info!("Stored token lacks required scopes, a new login is needed");
                current = None;
            }
        }

        if let Some(token) = current.filter(|t| t.refresh_token.is_some()) {
            info!("🔄 Access token expired, refreshing");
            match self.provider.refresh(&token).await {
                Ok(refreshed) => {
                    self.store.save(&refreshed)?;
                    info!("✅ Token refreshed");
                    return Ok(refreshed);
                }
                Err(e) => {
                    warn!("Token refresh failed: {} - falling back to login", e);
                }
            }
        }

        info!("🔐 Starting OAuth login flow");
        let token = self.provider.login().await?;
        self.store.save(&token)?;
        info!("✅ Login completed, token saved to {}", self.store.path().display());
        Ok(token)
    }
}
