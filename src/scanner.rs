use std::sync::OnceLock;

use async_trait::async_trait;
use log::{debug, info, warn};
use mail_parser::{MessageParser, MimeHeaders};
use regex::Regex;

use crate::config::GmailConfig;
use crate::credentials::Token;
use crate::error::{Result, WatcherError};

/// Mail provider operations needed by the scanner.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Id of the most recent message matching `query`, if any.
    async fn latest_message_id(&self, token: &Token, query: &str) -> Result<Option<String>>;

    /// Full RFC822 content of a message.
    async fn fetch_raw(&self, token: &Token, message_id: &str) -> Result<Vec<u8>>;

    /// Strip a label (name or id) from a message.
    async fn remove_label(&self, token: &Token, message_id: &str, label: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct MailItem {
    pub id: String,
    pub subject: String,
    /// First `text/html` part of the body
    pub html: Option<String>,
}

impl MailItem {
    pub fn parse(id: &str, raw: &[u8]) -> Result<Self> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| WatcherError::Mail(format!("unable to parse email {}", id)))?;

        let subject = message.subject().unwrap_or_default().to_string();

        let html = message
            .parts
            .iter()
            .find(|part| {
                part.content_type().map_or(false, |ct| {
                    ct.ctype().eq_ignore_ascii_case("text")
                        && ct.subtype().map_or(false, |s| s.eq_ignore_ascii_case("html"))
                })
            })
            .and_then(|part| part.text_contents())
            .map(str::to_string);

        Ok(MailItem {
            id: id.to_string(),
            subject,
            html,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No message matched the query
    NoMessage,
    /// A message was found but carried no download link
    NoLink { file_name: String },
    Found(ExtractedLink),
}

impl ScanOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            ScanOutcome::Found(link) => Some(&link.url),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            ScanOutcome::NoMessage => None,
            ScanOutcome::NoLink { file_name } => Some(file_name),
            ScanOutcome::Found(link) => Some(&link.file_name),
        }
    }
}

fn quoted_regex() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""(.+?)""#).expect("quoted subject pattern is valid"))
}

/// File name for a Kindle note: the first double-quoted part of the subject,
/// or the whole subject with spaces turned into underscores.
pub fn derive_file_name(subject: &str) -> String {
    match quoted_regex().captures(subject).and_then(|c| c.get(1)) {
        Some(quoted) => quoted.as_str().to_string(),
        None => subject.replace(' ', "_"),
    }
}

/// Finds the provider download link inside an HTML body.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    pattern: Regex,
}

impl LinkExtractor {
    pub fn new(pattern: Regex) -> Self {
        LinkExtractor { pattern }
    }

    pub fn extract(&self, html: &str) -> Option<String> {
        self.pattern.find(html).map(|m| m.as_str().to_string())
    }
}

pub struct MailScanner<'a> {
    mailbox: &'a dyn Mailbox,
    query: String,
    processed_label: String,
    links: LinkExtractor,
}

impl<'a> MailScanner<'a> {
    pub fn new(mailbox: &'a dyn Mailbox, config: &GmailConfig) -> Self {
        MailScanner {
            mailbox,
            query: config.query.clone(),
            processed_label: config.processed_label.clone(),
            links: LinkExtractor::new(config.link_pattern.clone()),
        }
    }

    /// Look at the single most recent matching message and pull out its
    /// download link and file name.
    ///
    /// Removing the processed label is best-effort: a failure is logged and
    /// the same message may be picked up again on the next tick.
    pub async fn scan(&self, token: &Token) -> Result<ScanOutcome> {
        let message_id = match self.mailbox.latest_message_id(token, &self.query).await? {
            Some(id) => id,
            None => {
                debug!("No email matches '{}'", self.query);
                return Ok(ScanOutcome::NoMessage);
            }
        };

        info!("📧 Found email {} matching '{}'", message_id, self.query);

        let raw = self.mailbox.fetch_raw(token, &message_id).await?;
        let item = MailItem::parse(&message_id, &raw)?;
        let file_name = derive_file_name(&item.subject);

        let url = match &item.html {
            Some(html) => self.links.extract(html),
            None => {
                debug!("Email {} has no HTML part", item.id);
                None
            }
        };

        if let Err(e) = self
            .mailbox
            .remove_label(token, &item.id, &self.processed_label)
            .await
        {
            warn!(
                "Failed to remove label '{}' from email {}: {}",
                self.processed_label, item.id, e
            );
        }

        Ok(match url {
            Some(url) => ScanOutcome::Found(ExtractedLink { url, file_name }),
            None => ScanOutcome::NoLink { file_name },
        })
    }
}
