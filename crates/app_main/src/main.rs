//! LiveLister - live directory listing in the terminal
//!
//! Main entry point. Parses the command line, sets up logging and runs the
//! listing loop on a blocking thread until Ctrl-C or the optional deadline.

mod app;
mod cli;
mod console;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging and panic hook first
    let _log_guard = app_log::init(cli.verbose)?;

    // Clean up old logs (7 days)
    if let Err(e) = app_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    tracing::info!("LiveLister starting...");

    let config = match app_core::ListingConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring unreadable configuration: {:#}", e);
            app_core::ListingConfig::default()
        }
    };
    let config = cli.apply_to(config);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    // The engine blocks on its inbox, keep it off the async workers
    let result = tokio::task::spawn_blocking(move || app::run(cli, config, shutdown)).await?;

    tracing::info!("LiveLister stopped");
    result
}
