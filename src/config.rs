use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_LINK_PATTERN: &str = r#"https://www\.amazon\.com/gp/f\.html\?[^'"]+"#;

#[derive(Debug, Clone)]
pub struct Config {
    pub google: GoogleConfig,
    pub gmail: GmailConfig,
    pub drive: DriveConfig,
    pub pushover: Option<PushoverConfig>,
    pub download_dir: PathBuf,
    pub log_file: PathBuf,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_secret_path: PathBuf,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub query: String,
    /// Label name or id stripped from a message once it has been scanned
    pub processed_label: String,
    pub link_pattern: Regex,
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Destination folder; uploads are skipped when unset
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PushoverConfig {
    pub app_token: String,
    pub user_key: String,
}

impl Config {
    pub fn new() -> Result<Self> {
        let link_pattern = env_or("KINDLE_LINK_PATTERN", DEFAULT_LINK_PATTERN);
        let link_pattern = Regex::new(&link_pattern)
            .with_context(|| format!("KINDLE_LINK_PATTERN is not a valid regex: {}", link_pattern))?;

        let poll_interval: u64 = env_or("POLL_INTERVAL_SECONDS", "5")
            .parse()
            .context("POLL_INTERVAL_SECONDS must be a whole number of seconds")?;

        Ok(Config {
            google: GoogleConfig {
                client_secret_path: env_or("GOOGLE_CLIENT_SECRET_PATH", "credentials.json").into(),
                token_path: env_or("GOOGLE_TOKEN_PATH", "token.json").into(),
            },
            gmail: GmailConfig {
                query: env_or("GMAIL_QUERY", "label:skribe"),
                processed_label: env_or("GMAIL_PROCESSED_LABEL", "skribe"),
                link_pattern,
            },
            drive: DriveConfig {
                folder_id: non_empty_var("DRIVE_FOLDER_ID"),
            },
            pushover: match (non_empty_var("PUSHOVER_TOKEN"), non_empty_var("PUSHOVER_USER")) {
                (Some(app_token), Some(user_key)) => Some(PushoverConfig { app_token, user_key }),
                _ => None,
            },
            download_dir: env_or("DOWNLOAD_FOLDER", "./downloads").into(),
            log_file: env_or("LOG_FILE", "kindle_watcher.log").into(),
            poll_interval: Duration::from_secs(poll_interval),
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_link_pattern_matches_kindle_link() {
        let re = Regex::new(DEFAULT_LINK_PATTERN).unwrap();
        let html = r#"<a href="https://www.amazon.com/gp/f.html?C=ABC&R=1">Download PDF</a>"#;
        assert_eq!(
            re.find(html).map(|m| m.as_str()),
            Some("https://www.amazon.com/gp/f.html?C=ABC&R=1")
        );
        assert!(re.find("https://www.amazon.com/other?x=1").is_none());
    }
}
