// Library exports for the kindle-watcher crate
// This allows integration tests to drive the pipeline with fake providers

pub mod archiver;
pub mod config;
pub mod credentials;
pub mod drive_client;
pub mod error;
pub mod fetcher;
pub mod gmail_client;
pub mod google_auth;
pub mod logging;
pub mod notifier;
pub mod scanner;
pub mod watcher;

pub use error::{Result, WatcherError};
