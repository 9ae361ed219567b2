use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;

use crate::config::PushoverConfig;
use crate::error::{Result, WatcherError};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";
const TITLE: &str = "Kindle Watcher";

/// Fire-and-forget user notifications. Implementations never fail.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Used when push credentials are not configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, _message: &str) {
        info!("Pushover not configured; skipping notification.");
    }
}

#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i32,
    #[serde(default)]
    errors: Vec<String>,
}

pub struct PushoverNotifier {
    client: reqwest::Client,
    app_token: String,
    user_key: String,
    api_url: String,
}

impl PushoverNotifier {
    pub fn new(config: &PushoverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WatcherError::Notify(e.to_string()))?;

        Ok(PushoverNotifier {
            client,
            app_token: config.app_token.clone(),
            user_key: config.user_key.clone(),
            api_url: PUSHOVER_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Send one message to the configured user.
    pub async fn send(&self, message: &str) -> Result<()> {
        let params = [
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", TITLE),
            ("message", message),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| WatcherError::Notify(e.to_string()))?;

        let status = response.status();
        let body: PushoverResponse = response
            .json()
            .await
            .map_err(|e| WatcherError::Notify(format!("HTTP {}: {}", status, e)))?;

        if body.status != 1 {
            return Err(WatcherError::Notify(format!(
                "HTTP {}: {}",
                status,
                body.errors.join(", ")
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => info!("Pushover notification sent."),
            Err(e) => error!("Pushover notification failed: {}", e),
        }
    }
}

/// Pushover when both credentials are present, otherwise a no-op notifier.
pub fn from_config(config: Option<&PushoverConfig>) -> Arc<dyn Notifier> {
    let Some(pushover) = config else {
        info!("ℹ️  PUSHOVER_TOKEN or PUSHOVER_USER not set - push notifications disabled");
        return Arc::new(DisabledNotifier);
    };

    match PushoverNotifier::new(pushover) {
        Ok(notifier) => {
            info!("✅ Pushover notifications enabled");
            Arc::new(notifier)
        }
        Err(e) => {
            error!("Unable to initialize Pushover notifier: {} - notifications disabled", e);
            Arc::new(DisabledNotifier)
        }
    }
}
