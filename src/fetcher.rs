use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, error, info};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, WatcherError};

pub const USER_AGENT: &str = "Mozilla/5.0";
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads linked documents into the download directory.
pub struct Fetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl Fetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| WatcherError::Download(format!("unable to build HTTP client: {}", e)))?;

        Ok(Fetcher {
            client,
            download_dir: download_dir.into(),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download `url` to `<download_dir>/<file_name>.pdf`.
    ///
    /// Returns `None` on any transport error or non-2xx status. A partially
    /// written file is left in place.
    pub async fn fetch(&self, url: &str, file_name: &str) -> Option<PathBuf> {
        match self.try_fetch(url, file_name).await {
            Ok(path) => {
                info!("⬇️  Downloaded {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Download failed: {}", e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let local_name = local_file_name(file_name)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WatcherError::Download(e.to_string()))?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self.download_dir.join(format!("{}.pdf", local_name));
        let mut file = tokio::fs::File::create(&path).await?;

        let mut written = 0usize;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| WatcherError::Download(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!("{} bytes written to {}", written, path.display());
        Ok(path)
    }
}

/// Turn a derived note name into a single path component so the download
/// always lands directly inside the download directory.
pub fn local_file_name(file_name: &str) -> Result<String> {
    let name: String = file_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match name.as_str() {
        "" | "." | ".." => Err(WatcherError::Download(format!(
            "refusing unusable file name {:?}",
            file_name
        ))),
        _ => Ok(name),
    }
}
