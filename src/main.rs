use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use podserve::config::{Config, Settings};
use podserve::feed::{render_feed, FeedBuilder};
use podserve::server::{self, feed_slot, AppState, Regenerator};

#[derive(Parser, Debug)]
#[command(
    name = "podserve",
    about = "Serve a directory of audio files as a podcast feed",
    after_help = "Podcast metadata is read from BASEURL, POD_TITLE, POD_DESCRIPTION, \
                  POD_IMAGE and POD_AUTHOR (required) and POD_EMAIL, POD_SUMMARY, \
                  POD_LANGUAGE, POD_EPISODE_AUTHOR (optional)."
)]
struct Args {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(short, long, value_name = "FILE", default_value = "podserve.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory of audio files to publish
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Seconds between feed regenerations
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Print the feed once to stdout and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(dir) = &self.dir {
            settings.directory = dir.clone();
        }
        if let Some(interval) = self.interval {
            settings.refresh_interval_secs = interval;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    args.apply(&mut settings);

    let config = Config::resolve(settings, |key| std::env::var(key).ok())
        .context("Invalid configuration")?;
    let builder = Arc::new(FeedBuilder::from_settings(&config.settings));

    if args.once {
        let dir = config.directory.clone();
        let podcast = config.podcast.clone();
        let xml = tokio::task::spawn_blocking(move || builder.build(&dir, &podcast))
            .await
            .context("Feed build task failed")??;
        println!("{}", xml);
        return Ok(());
    }

    // Requests arriving before the first successful build get an empty channel
    let (publisher, reader) = feed_slot(render_feed(&config.podcast, &[], Utc::now()));
    let regenerator = Regenerator::new(
        builder,
        config.directory.clone(),
        Arc::new(config.podcast.clone()),
        publisher,
    );
    if let Err(e) = regenerator.regenerate().await {
        tracing::warn!(error = %e, "Initial feed build failed, serving empty feed until next cycle");
    }

    let shutdown = CancellationToken::new();
    let regeneration = regenerator.spawn(config.refresh_interval(), shutdown.clone());

    let addr = SocketAddr::new(config.settings.bind, config.settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        addr = %addr,
        feed = %config.podcast.base_url,
        dir = %config.directory.display(),
        "Serving podcast feed"
    );

    tokio::spawn(cancel_on_signal(shutdown.clone()));
    server::serve(
        listener,
        AppState::new(reader, config.directory.clone()),
        shutdown.clone(),
        config.shutdown_grace(),
    )
    .await
    .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = regeneration.await {
        tracing::warn!(error = %e, "Regeneration task ended abnormally");
    }
    tracing::info!("Goodbye");
    Ok(())
}

/// Cancels `shutdown` on SIGINT, or SIGTERM on Unix.
async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for SIGINT");
                return;
            }
            tracing::info!("Received SIGINT, shutting down gracefully");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully");
        }
    }
    shutdown.cancel();
}
