use async_trait::async_trait;
use google_gmail1::{api::Scope, hyper, hyper_rustls, Gmail};
use log::{debug, info, warn};

use crate::credentials::Token;
use crate::error::{Result, WatcherError};
use crate::scanner::Mailbox;

pub type HttpsConnector = hyper_rustls::HttpsConnector<hyper::client::HttpConnector>;
pub type HttpsClient = hyper::Client<HttpsConnector>;

const USER_ID: &str = "me";

/// HTTP client shared by the Gmail and Drive hubs.
pub fn https_client() -> Result<HttpsClient> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(hyper::Client::builder().build(connector))
}

#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub name: String,
    pub id: String,
    pub label_type: String,
}

pub struct GmailMailbox {
    client: HttpsClient,
}

impl GmailMailbox {
    pub fn new(client: HttpsClient) -> Self {
        GmailMailbox { client }
    }

    fn hub(&self, token: &Token) -> Gmail<HttpsConnector> {
        Gmail::new(self.client.clone(), token.access_token.clone())
    }

    /// List all Gmail labels, user labels first then by name.
    pub async fn list_labels(&self, token: &Token) -> Result<Vec<LabelInfo>> {
        debug!("Retrieving Gmail labels list");

        let result = self
            .hub(token)
            .users()
            .labels_list(USER_ID)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(|e| WatcherError::Mail(format!("unable to list labels: {}", e)))?;

        let mut labels: Vec<LabelInfo> = result
            .1
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| LabelInfo {
                name: label.name.unwrap_or_else(|| "Unknown".to_string()),
                id: label.id.unwrap_or_else(|| "Unknown".to_string()),
                label_type: label.type_.unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect();

        labels.sort_by(|a, b| {
            let a_user = a.label_type == "user";
            let b_user = b.label_type == "user";
            b_user.cmp(&a_user).then_with(|| a.name.cmp(&b.name))
        });

        Ok(labels)
    }

    /// Label ids are needed for modify requests; a value that matches no
    /// label name is assumed to already be an id.
    async fn resolve_label_id(&self, token: &Token, label: &str) -> Result<String> {
        let labels = self.list_labels(token).await?;

        match labels.iter().find(|l| l.name == label || l.id == label) {
            Some(found) => Ok(found.id.clone()),
            None => {
                warn!("Label '{}' not found by name, using it as a label id", label);
                Ok(label.to_string())
            }
        }
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn latest_message_id(&self, token: &Token, query: &str) -> Result<Option<String>> {
        debug!("Search criteria: {}", query);

        let result = self
            .hub(token)
            .users()
            .messages_list(USER_ID)
            .q(query)
            .max_results(1)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(|e| WatcherError::Mail(format!("error searching for emails: {}", e)))?;

        Ok(result
            .1
            .messages
            .unwrap_or_default()
            .into_iter()
            .find_map(|msg| msg.id))
    }

    async fn fetch_raw(&self, token: &Token, message_id: &str) -> Result<Vec<u8>> {
        debug!("Complete email retrieval for ID: {}", message_id);

        let (_, message) = self
            .hub(token)
            .users()
            .messages_get(USER_ID, message_id)
            .format("raw")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(|e| WatcherError::Mail(format!("unable to retrieve email {}: {}", message_id, e)))?;

        // The hub already base64-decodes `raw` into RFC822 bytes
        let raw = message
            .raw
            .ok_or_else(|| WatcherError::Mail(format!("email {} has no raw content", message_id)))?;

        debug!("Email retrieved, size: {} bytes", raw.len());
        Ok(raw)
    }

    async fn remove_label(&self, token: &Token, message_id: &str, label: &str) -> Result<()> {
        let label_id = self.resolve_label_id(token, label).await?;

        let request = google_gmail1::api::ModifyMessageRequest {
            remove_label_ids: Some(vec![label_id.clone()]),
            ..Default::default()
        };

        self.hub(token)
            .users()
            .messages_modify(request, USER_ID, message_id)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .map_err(|e| WatcherError::Mail(format!("unable to modify email labels: {}", e)))?;

        info!("Removed label {} from email {}", label_id, message_id);
        Ok(())
    }
}
