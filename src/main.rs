use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use website_cloner::cli::{ClonerCommand, Command};
use website_cloner::cloner::WebsiteCloner;
use website_cloner::config::ClonerConfig;
use website_cloner::events::{truncate_url, Event, EventKind, EventSink};
use website_cloner::server;

/// Shows pipeline progress on a spinner, printing warnings above it.
struct SpinnerSink {
    progress_bar: ProgressBar,
}

impl EventSink for SpinnerSink {
    fn emit(&self, event: Event) {
        match event.kind {
            EventKind::Pipeline => self.progress_bar.set_message(event.message),
            EventKind::Network | EventKind::Console => {
                self.progress_bar.set_message(truncate_url(&event.message, 80))
            }
            EventKind::Warning => self
                .progress_bar
                .println(format!("⚠️  {}", event.message.yellow())),
            EventKind::Error => self
                .progress_bar
                .println(format!("❌ {}", event.message.red())),
            EventKind::Complete => {}
        }
    }
}

async fn clone_once(config: &ClonerConfig, url: &str) -> Result<()> {
    println!("🚀 Cloning: {}", url.blue());
    println!("📁 Output directory: {:?}", config.output_dir);
    println!("⚡ Max concurrent downloads: {}", config.max_concurrent);

    let cloner = WebsiteCloner::with_http(config).context("Failed to build HTTP client")?;

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    let sink = SpinnerSink {
        progress_bar: progress_bar.clone(),
    };

    let result = cloner.clone_url(url, &sink).await;

    if result.success {
        progress_bar.finish_with_message("✅ Clone complete!");
        if let Some(output_path) = &result.output_path {
            println!("📂 Saved to: {}", output_path.green());
        }
        if let Some(open_url) = &result.open_url {
            println!("🔗 Open URL: {}", open_url);
        }
        Ok(())
    } else {
        progress_bar.abandon_with_message("❌ Clone failed");
        bail!(
            "{}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClonerCommand::parse();

    let log_level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ClonerConfig::from_toml_file(path)?,
        None => ClonerConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    match &args.command {
        Command::Serve { .. } => server::run(config).await,
        Command::Clone { url } => clone_once(&config, url).await,
    }
}
