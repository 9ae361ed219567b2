use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_gmail1::oauth2;
use google_gmail1::oauth2::storage::{TokenInfo, TokenStorage};
use log::{debug, info};

use crate::credentials::{AuthProvider, Token, SCOPES};
use crate::error::{Result, WatcherError};

/// [`AuthProvider`] backed by Google's OAuth endpoints through `yup-oauth2`.
pub struct GoogleAuthProvider {
    client_secret_path: PathBuf,
}

impl GoogleAuthProvider {
    pub fn new(client_secret_path: impl Into<PathBuf>) -> Self {
        GoogleAuthProvider {
            client_secret_path: client_secret_path.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for GoogleAuthProvider {
    async fn refresh(&self, token: &Token) -> Result<Token> {
        let (client_id, client_secret, refresh_token) = match (
            &token.client_id,
            &token.client_secret,
            &token.refresh_token,
        ) {
            (Some(id), Some(secret), Some(refresh)) => (id.clone(), secret.clone(), refresh.clone()),
            _ => {
                return Err(WatcherError::Auth(
                    "stored token has no client id, client secret or refresh token".to_string(),
                ))
            }
        };

        let secret = oauth2::authorized_user::AuthorizedUserSecret {
            client_id,
            client_secret,
            refresh_token,
            key_type: "authorized_user".to_string(),
        };

        let auth = oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .map_err(|e| WatcherError::Auth(format!("unable to create refresh authenticator: {}", e)))?;

        let access = auth
            .token(&SCOPES)
            .await
            .map_err(|e| WatcherError::Auth(format!("token refresh rejected: {}", e)))?;

        let access_token = access
            .token()
            .ok_or_else(|| WatcherError::Auth("refresh returned no access token".to_string()))?
            .to_string();

        Ok(Token {
            access_token,
            expiry: access.expiration_time().and_then(|t| DateTime::from_timestamp(t.unix_timestamp(), 0)),
            ..token.clone()
        })
    }

    async fn login(&self) -> Result<Token> {
        if !self.client_secret_path.exists() {
            return Err(WatcherError::CredentialsUnavailable(self.client_secret_path.clone()));
        }

        let secret = oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|e| WatcherError::Auth(format!("unable to read client secret: {}", e)))?;

        info!("Waiting for browser authorization on a local callback listener");

        let captured = CapturedToken::default();
        let auth = oauth2::InstalledFlowAuthenticator::builder(
            secret.clone(),
            oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(captured.clone()))
        .build()
        .await
        .map_err(|e| WatcherError::Auth(format!("unable to create OAuth2 authenticator: {}", e)))?;

        let access = auth
            .token(&SCOPES)
            .await
            .map_err(|e| WatcherError::Auth(format!("login flow failed: {}", e)))?;

        let access_token = access
            .token()
            .ok_or_else(|| WatcherError::Auth("login returned no access token".to_string()))?
            .to_string();

        let refresh_token = captured.refresh_token();
        if refresh_token.is_none() {
            debug!("Login granted no refresh token, next expiry will require a new login");
        }

        Ok(Token {
            access_token,
            refresh_token,
            token_uri: secret.token_uri,
            client_id: Some(secret.client_id),
            client_secret: Some(secret.client_secret),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry: access
                .expiration_time()
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0)),
        })
    }
}

/// Token storage that only records what the login flow produced, so the
/// refresh token can be written to our own token file.
#[derive(Clone, Default)]
struct CapturedToken(Arc<Mutex<Option<TokenInfo>>>);

impl CapturedToken {
    fn refresh_token(&self) -> Option<String> {
        self.0
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().and_then(|info| info.refresh_token.clone()))
    }
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow::anyhow!("captured token lock poisoned"))?;
        *guard = Some(token);
        Ok(())
    }

    async fn get(&self, _target_scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}
