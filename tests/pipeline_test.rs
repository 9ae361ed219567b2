use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use kindle_watcher::archiver::RemoteStorage;
use kindle_watcher::config::{Config, DriveConfig, GmailConfig, GoogleConfig};
use kindle_watcher::credentials::{CredentialManager, Token, TokenStore, GOOGLE_TOKEN_URI, SCOPES};
use kindle_watcher::google_auth::GoogleAuthProvider;
use kindle_watcher::notifier::Notifier;
use kindle_watcher::scanner::Mailbox;
use kindle_watcher::watcher::{TickOutcome, Watcher};
use kindle_watcher::WatcherError;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n%";

/// Mailbox where removing the label takes the message out of the query.
#[derive(Default)]
struct FakeMailbox {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeMailbox {
    fn with_message(id: &str, raw: String) -> Self {
        FakeMailbox {
            messages: Mutex::new(vec![(id.to_string(), raw.into_bytes())]),
        }
    }
}

#[async_trait]
impl Mailbox for FakeMailbox {
    async fn latest_message_id(&self, _token: &Token, _query: &str) -> kindle_watcher::Result<Option<String>> {
        Ok(self.messages.lock().unwrap().first().map(|(id, _)| id.clone()))
    }

    async fn fetch_raw(&self, _token: &Token, message_id: &str) -> kindle_watcher::Result<Vec<u8>> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, raw)| raw.clone())
            .ok_or_else(|| WatcherError::Mail(format!("no message {}", message_id)))
    }

    async fn remove_label(&self, _token: &Token, message_id: &str, _label: &str) -> kindle_watcher::Result<()> {
        self.messages.lock().unwrap().retain(|(id, _)| id != message_id);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingStorage {
    uploads: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
}

#[async_trait]
impl RemoteStorage for RecordingStorage {
    async fn upload(&self, _token: &Token, path: &Path, name: &str, parent: &str) -> kindle_watcher::Result<String> {
        let content = std::fs::read(path)?;
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((name.to_string(), parent.to_string(), content));
        Ok(format!("drive-{}", uploads.len()))
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Serve `PDF_BYTES` to every connection until the test ends.
async fn pdf_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                PDF_BYTES.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(PDF_BYTES).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

fn kindle_email(subject: &str, link: &str) -> String {
    format!(
        "From: Amazon Kindle <do-not-reply@amazon.com>\r\n\
Subject: {}\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><a href=\"{}\">Download PDF</a></body></html>\r\n\
--b1--\r\n",
        subject, link
    )
}

fn test_config(dir: &Path, folder_id: Option<&str>) -> Config {
    Config {
        google: GoogleConfig {
            client_secret_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
        },
        gmail: GmailConfig {
            query: "label:skribe".to_string(),
            processed_label: "skribe".to_string(),
            link_pattern: Regex::new(r#"http://127\.0\.0\.1:\d+/gp/f\.html\?[^'"]+"#).unwrap(),
        },
        drive: DriveConfig {
            folder_id: folder_id.map(str::to_string),
        },
        pushover: None,
        download_dir: dir.join("downloads"),
        log_file: dir.join("kindle_watcher.log"),
        poll_interval: Duration::ZERO,
    }
}

fn save_valid_token(path: &Path) {
    let token = Token {
        access_token: "ya29.test".to_string(),
        refresh_token: Some("1//refresh".to_string()),
        token_uri: GOOGLE_TOKEN_URI.to_string(),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        expiry: Some(Utc::now() + chrono::Duration::hours(1)),
    };
    TokenStore::new(path).save(&token).unwrap();
}

struct Harness {
    watcher: Watcher,
    storage: RecordingStorage,
    notifier: RecordingNotifier,
    download_dir: PathBuf,
}

fn harness(dir: &Path, folder_id: Option<&str>, mailbox: FakeMailbox, with_token: bool) -> Harness {
    let config = test_config(dir, folder_id);
    if with_token {
        save_valid_token(&config.google.token_path);
    }

    let credentials = CredentialManager::new(
        TokenStore::new(&config.google.token_path),
        Box::new(GoogleAuthProvider::new(&config.google.client_secret_path)),
    );
    let storage = RecordingStorage::default();
    let notifier = RecordingNotifier::default();
    let download_dir = config.download_dir.clone();

    let watcher = Watcher::new(
        config,
        credentials,
        Box::new(mailbox),
        Box::new(storage.clone()),
        Arc::new(notifier.clone()),
    )
    .unwrap();

    Harness {
        watcher,
        storage,
        notifier,
        download_dir,
    }
}

#[tokio::test]
async fn test_empty_mailbox_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), Some("folder-1"), FakeMailbox::default(), true);

    let outcome = h.watcher.run_once().await.unwrap();

    assert_eq!(outcome, TickOutcome::Idle);
    assert!(h.storage.uploads.lock().unwrap().is_empty());
    assert!(h.notifier.messages.lock().unwrap().is_empty());
    assert!(!h.download_dir.exists());
}

#[tokio::test]
async fn test_ten_byte_document_is_archived_once() {
    let dir = tempfile::tempdir().unwrap();
    let base = pdf_server().await;
    let link = format!("{}/gp/f.html?C=2Q0&K=abc", base);
    let mailbox = FakeMailbox::with_message("m1", kindle_email(r#"Send to Kindle: "My Great Book""#, &link));
    let h = harness(dir.path(), Some("folder-1"), mailbox, true);

    let outcome = h.watcher.run_once().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Archived {
            file_name: "My Great Book".to_string(),
            remote_id: "drive-1".to_string(),
        }
    );
    {
        let uploads = h.storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "My Great Book.pdf");
        assert_eq!(uploads[0].1, "folder-1");
        assert_eq!(uploads[0].2.len(), 10);
    }
    assert!(!h.download_dir.join("My Great Book.pdf").exists());
    assert_eq!(
        *h.notifier.messages.lock().unwrap(),
        vec!["Uploaded My Great Book.pdf from Kindle note: My Great Book".to_string()]
    );

    // Nothing new in the mailbox: a second pass uploads nothing
    let second = h.watcher.run_once().await.unwrap();
    assert_eq!(second, TickOutcome::Idle);
    assert_eq!(h.storage.uploads.lock().unwrap().len(), 1);
    assert_eq!(std::fs::read_dir(&h.download_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_folder_keeps_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = pdf_server().await;
    let link = format!("{}/gp/f.html?C=1", base);
    let mailbox = FakeMailbox::with_message("m1", kindle_email("Convert My Report", &link));
    let h = harness(dir.path(), None, mailbox, true);

    let outcome = h.watcher.run_once().await.unwrap();

    let expected_path = h.download_dir.join("Convert_My_Report.pdf");
    assert_eq!(
        outcome,
        TickOutcome::ArchiveSkipped {
            path: expected_path.clone()
        }
    );
    assert!(expected_path.exists());
    assert!(h.storage.uploads.lock().unwrap().is_empty());
    assert!(h.notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_email_without_link_downloads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = FakeMailbox::with_message(
        "m1",
        kindle_email("Convert My Report", "https://example.com/elsewhere"),
    );
    let h = harness(dir.path(), Some("folder-1"), mailbox, true);

    let outcome = h.watcher.run_once().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::NoLink {
            file_name: "Convert_My_Report".to_string()
        }
    );
    assert!(!h.download_dir.exists());
}

#[tokio::test]
async fn test_missing_credentials_abort_tick_but_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), Some("folder-1"), FakeMailbox::default(), false);

    let err = h.watcher.run_once().await.unwrap_err();
    assert!(matches!(err, WatcherError::CredentialsUnavailable(_)));

    let ticks = h.watcher.run(Some(3)).await;
    assert_eq!(ticks, 3);
    assert!(!dir.path().join("token.json").exists());
    assert!(h.storage.uploads.lock().unwrap().is_empty());
}
