use anyhow::Result;
use clap::Parser;
use log::info;

use kindle_watcher::config::Config;
use kindle_watcher::credentials::{CredentialManager, TokenStore};
use kindle_watcher::drive_client::DriveStorage;
use kindle_watcher::gmail_client::{self, GmailMailbox};
use kindle_watcher::google_auth::GoogleAuthProvider;
use kindle_watcher::watcher::Watcher;
use kindle_watcher::{logging, notifier};

#[derive(Parser)]
#[command(name = "kindle-watcher")]
#[command(about = "Moves Kindle note PDFs from Gmail to Google Drive")]
#[command(version = "0.1.0")]
struct Args {
    /// Run a single polling pass and exit
    #[arg(long)]
    once: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Print the Gmail labels (name and id) and exit
    #[arg(long)]
    list_labels: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();
    let config = Config::new()?;

    if args.check_config {
        print_config(&config);
        return Ok(());
    }

    logging::init(&config.log_file);

    let http = gmail_client::https_client()?;
    let credentials = CredentialManager::new(
        TokenStore::new(&config.google.token_path),
        Box::new(GoogleAuthProvider::new(&config.google.client_secret_path)),
    );

    if args.list_labels {
        let token = credentials.acquire().await?;
        let labels = GmailMailbox::new(http).list_labels(&token).await?;

        println!("{:<40} {:<30} {:<15}", "Label Name", "Label ID", "Type");
        println!("{}", "=".repeat(85));
        for label in labels {
            println!("{:<40} {:<30} {:<15}", label.name, label.id, label.label_type);
        }
        return Ok(());
    }

    info!("=== Kindle Watcher Starting ===");

    let notifier = notifier::from_config(config.pushover.as_ref());
    let watcher = Watcher::new(
        config,
        credentials,
        Box::new(GmailMailbox::new(http.clone())),
        Box::new(DriveStorage::new(http)),
        notifier,
    )?;

    watcher.announce_startup().await;

    let max_ticks = args.once.then_some(1);
    tokio::select! {
        ticks = watcher.run(max_ticks) => {
            info!("Stopped after {} tick(s)", ticks);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("✅ Configuration valid!");
    println!("🔑 Client secret: {}", config.google.client_secret_path.display());
    println!("💾 Token file: {}", config.google.token_path.display());
    println!("📧 Gmail query: {}", config.gmail.query);
    println!("🏷️  Processed label: {}", config.gmail.processed_label);
    println!("🔗 Link pattern: {}", config.gmail.link_pattern.as_str());
    println!(
        "☁️  Drive folder: {}",
        config.drive.folder_id.as_deref().unwrap_or("(not set, uploads skipped)")
    );
    println!(
        "📣 Pushover: {}",
        if config.pushover.is_some() { "enabled" } else { "disabled" }
    );
    println!("📁 Download folder: {}", config.download_dir.display());
    println!("📝 Log file: {}", config.log_file.display());
    println!("⏱️  Poll interval: {:?}", config.poll_interval);
}
