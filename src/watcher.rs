use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info};

use crate::archiver::{ArchiveOutcome, Archiver, RemoteStorage};
use crate::config::Config;
use crate::credentials::CredentialManager;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::notifier::Notifier;
use crate::scanner::{MailScanner, Mailbox, ScanOutcome};

/// What a single pass of the pipeline ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No matching email
    Idle,
    NoLink { file_name: String },
    DownloadFailed { file_name: String },
    Archived { file_name: String, remote_id: String },
    ArchiveSkipped { path: PathBuf },
    ArchiveFailed { path: PathBuf },
}

/// Polls the mailbox and moves Kindle notes to Drive, one email per tick.
pub struct Watcher {
    config: Config,
    credentials: CredentialManager,
    mailbox: Box<dyn Mailbox>,
    storage: Box<dyn RemoteStorage>,
    fetcher: Fetcher,
    notifier: Arc<dyn Notifier>,
}

impl Watcher {
    pub fn new(
        config: Config,
        credentials: CredentialManager,
        mailbox: Box<dyn Mailbox>,
        storage: Box<dyn RemoteStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(&config.download_dir)?;

        Ok(Watcher {
            config,
            credentials,
            mailbox,
            storage,
            fetcher,
            notifier,
        })
    }

    pub async fn announce_startup(&self) {
        self.notifier.notify("Kindle watcher starting.").await;
    }

    /// One pipeline pass: credentials, scan, download, upload, notify.
    ///
    /// Only credential and mailbox failures are returned as errors; download
    /// and upload failures are logged and reported through the outcome.
    pub async fn run_once(&self) -> Result<TickOutcome> {
        let token = self.credentials.acquire().await?;

        let scanner = MailScanner::new(self.mailbox.as_ref(), &self.config.gmail);
        let link = match scanner.scan(&token).await? {
            ScanOutcome::NoMessage => {
                info!("No new Kindle emails found.");
                return Ok(TickOutcome::Idle);
            }
            ScanOutcome::NoLink { file_name } => {
                info!("No Kindle download link in email for '{}'", file_name);
                return Ok(TickOutcome::NoLink { file_name });
            }
            ScanOutcome::Found(link) => link,
        };

        info!("🔗 Found Kindle link: {} -> {}", link.file_name, link.url);

        let Some(path) = self.fetcher.fetch(&link.url, &link.file_name).await else {
            return Ok(TickOutcome::DownloadFailed {
                file_name: link.file_name,
            });
        };

        let archiver = Archiver::new(self.storage.as_ref(), self.config.drive.folder_id.as_deref());
        let uploaded_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(match archiver.archive(&token, &path).await {
            ArchiveOutcome::Uploaded { remote_id } => {
                self.notifier
                    .notify(&format!(
                        "Uploaded {} from Kindle note: {}",
                        uploaded_name, link.file_name
                    ))
                    .await;
                TickOutcome::Archived {
                    file_name: link.file_name,
                    remote_id,
                }
            }
            ArchiveOutcome::Skipped => TickOutcome::ArchiveSkipped { path },
            ArchiveOutcome::Failed => {
                self.notifier
                    .notify(&format!(
                        "Upload of {} failed, file kept in {}",
                        uploaded_name,
                        self.fetcher.download_dir().display()
                    ))
                    .await;
                TickOutcome::ArchiveFailed { path }
            }
        })
    }

    /// Run ticks back to back with the fixed poll interval in between.
    ///
    /// A failing tick is logged and never stops the loop. `None` runs
    /// forever; returns the number of ticks executed.
    pub async fn run(&self, max_ticks: Option<u64>) -> u64 {
        info!(
            "🔄 Polling '{}' every {:?}",
            self.config.gmail.query, self.config.poll_interval
        );

        let mut ticks = 0;
        loop {
            match self.run_once().await {
                Ok(outcome) => debug!("Tick {} finished: {:?}", ticks + 1, outcome),
                Err(e) => error!("Main loop error: {}", e),
            }
            ticks += 1;

            if max_ticks.map_or(false, |max| ticks >= max) {
                return ticks;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
