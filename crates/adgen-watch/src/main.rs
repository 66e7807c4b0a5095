//! Command-line watcher for generation jobs, campaigns and projects.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adgen_cache::{preview_cache_key, FsPreviewCache, PreviewCache};
use adgen_models::{PollTarget, Status, TargetKind};
use adgen_poller::{
    HttpStatusFetcher, PollBinding, PollError, PollObserver, PollerConfig, Severity,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to watch: job, campaign or project
    kind: TargetKind,

    /// Identifier of the job, campaign or project
    id: String,

    /// Delay between status requests in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Directory to store the finished preview video in
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

/// How the watched target ended.
#[derive(Debug)]
enum Outcome {
    Completed(Status),
    Failed(String),
}

/// Logs progress and forwards the terminal report.
struct ConsoleObserver {
    outcome: mpsc::UnboundedSender<Outcome>,
}

impl PollObserver for ConsoleObserver {
    fn on_status(&self, status: &Status) {
        match status.percent_complete {
            Some(percent) => info!(state = %status.raw_state, "Progress {:.0}%", percent),
            None => info!(state = %status.raw_state, "Status update"),
        }
    }

    fn on_success(&self, status: &Status) {
        let _ = self.outcome.send(Outcome::Completed(status.clone()));
    }

    fn on_error(&self, error: &PollError, severity: Severity) {
        if severity.is_fatal() {
            let _ = self.outcome.send(Outcome::Failed(error.to_string()));
        } else {
            warn!(kind = error.kind(), "Status check failed: {}", error);
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adgen=info,adgen_poller=info,adgen_watch=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Download the preview and store it in the cache directory.
async fn store_preview(cache_dir: &Path, target: &PollTarget, url: &str) -> Result<PathBuf> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to download preview from {}", url))?
        .error_for_status()
        .context("Preview download was rejected")?;
    let bytes = response.bytes().await.context("Failed to read preview body")?;

    let cache = FsPreviewCache::new(cache_dir);
    cache.open().await.context("Failed to open preview cache")?;

    let key = preview_cache_key(target.kind, &target.id);
    let stored = cache.put(&key, bytes.to_vec()).await;
    cache.close().await?;
    stored.context("Failed to store preview")?;

    Ok(cache.entry_path(&key))
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = PollerConfig::from_env().context("Invalid poller configuration")?;
    if let Some(ms) = args.interval_ms.filter(|ms| *ms > 0) {
        config = config.with_interval(Duration::from_millis(ms));
    }

    let fetcher = HttpStatusFetcher::new(config).context("Failed to create status fetcher")?;
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let observer = ConsoleObserver {
        outcome: outcome_tx,
    };

    let target = PollTarget::new(args.kind, args.id);
    let mut binding = PollBinding::http(fetcher, Arc::new(observer));

    info!(target = %target, interval_ms = binding.interval().as_millis() as u64, "Watching");
    binding.watch(Some(target.clone()), true);

    let outcome = tokio::select! {
        outcome = outcome_rx.recv() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            None
        }
    };
    binding.teardown();

    match outcome {
        Some(Outcome::Completed(status)) => {
            info!(target = %target, "Generation completed");

            if let (Some(dir), Some(url)) = (&args.cache_dir, &status.preview_url) {
                let path = store_preview(dir, &target, url).await?;
                info!(path = %path.display(), "Stored preview");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Outcome::Failed(message)) => {
            error!(target = %target, "{}", message);
            Ok(ExitCode::FAILURE)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
