use std::path::Path;

use async_trait::async_trait;
use log::{error, info};

use crate::credentials::Token;
use crate::error::Result;

/// Remote storage able to hold uploaded documents.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Upload the file at `path` as `name` under the container `parent`,
    /// returning the remote object id.
    async fn upload(&self, token: &Token, path: &Path, name: &str, parent: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Uploaded { remote_id: String },
    /// No destination folder configured
    Skipped,
    /// Upload failed, the local file is kept
    Failed,
}

pub struct Archiver<'a> {
    storage: &'a dyn RemoteStorage,
    folder_id: Option<&'a str>,
}

impl<'a> Archiver<'a> {
    pub fn new(storage: &'a dyn RemoteStorage, folder_id: Option<&'a str>) -> Self {
        Archiver { storage, folder_id }
    }

    /// Upload a downloaded file and delete the local copy once stored.
    pub async fn archive(&self, token: &Token, path: &Path) -> ArchiveOutcome {
        let Some(folder_id) = self.folder_id else {
            error!("DRIVE_FOLDER_ID is not set; skipping upload of {}", path.display());
            return ArchiveOutcome::Skipped;
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.storage.upload(token, path, &name, folder_id).await {
            Ok(remote_id) => {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => info!("☁️  Uploaded and removed local file {}", path.display()),
                    Err(e) => error!("Uploaded {} but could not remove it: {}", path.display(), e),
                }
                ArchiveOutcome::Uploaded { remote_id }
            }
            Err(e) => {
                error!("Upload to Drive failed for {}: {}", path.display(), e);
                ArchiveOutcome::Failed
            }
        }
    }
}
