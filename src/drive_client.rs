use std::path::Path;

use async_trait::async_trait;
use google_drive3::api::{File, Scope};
use google_drive3::DriveHub;
use log::debug;

use crate::archiver::RemoteStorage;
use crate::credentials::Token;
use crate::error::{Result, WatcherError};
use crate::gmail_client::{HttpsClient, HttpsConnector};

pub struct DriveStorage {
    client: HttpsClient,
}

impl DriveStorage {
    pub fn new(client: HttpsClient) -> Self {
        DriveStorage { client }
    }

    fn hub(&self, token: &Token) -> DriveHub<HttpsConnector> {
        DriveHub::new(self.client.clone(), token.access_token.clone())
    }
}

#[async_trait]
impl RemoteStorage for DriveStorage {
    async fn upload(&self, token: &Token, path: &Path, name: &str, parent: &str) -> Result<String> {
        debug!("Uploading {} to Drive folder {}", path.display(), parent);

        let metadata = File {
            name: Some(name.to_string()),
            parents: Some(vec![parent.to_string()]),
            ..Default::default()
        };
        let content = std::fs::File::open(path)?;

        let (_, created) = self
            .hub(token)
            .files()
            .create(metadata)
            .param("fields", "id")
            .add_scope(Scope::File)
            .upload_resumable(content, mime::APPLICATION_PDF)
            .await
            .map_err(|e| WatcherError::Upload(e.to_string()))?;

        Ok(created.id.unwrap_or_default())
    }
}
