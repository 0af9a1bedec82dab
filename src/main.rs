//! Binary entrypoint for manifest-listen.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use manifest_listen::config::Configuration;
use manifest_listen::display::{Gallery, ImageDisplay};
use manifest_listen::manifest::HttpFetcher;
use manifest_listen::reconcile::Reconciler;
use manifest_listen::state::ConfigState;
use manifest_listen::tasks::loader::DecodingLoader;
use manifest_listen::tasks::poller::PollScheduler;
use manifest_listen::web;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "manifest-listen",
    version,
    about = "Reload displayed images whenever a remote manifest changes"
)]
struct Args {
    /// Path to YAML config (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Manifest URL to poll, overriding the config file
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Poll period in milliseconds, overriding the config file
    #[arg(long = "poll-interval-ms", value_name = "MILLIS")]
    poll_interval_ms: Option<u64>,
    /// Do not start the local control web server
    #[arg(long = "no-control")]
    no_control: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if verbosity > 0 {
        let level = if verbosity == 1 {
            Level::DEBUG
        } else {
            Level::TRACE
        };
        filter = filter.add_directive(
            format!("manifest_listen={level}")
                .parse()
                .context("invalid log directive")?,
        );
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<Configuration> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(url) = &args.url {
        cfg.manifest_url = url.clone();
    }
    if let Some(ms) = args.poll_interval_ms {
        cfg.poll_interval_ms = ms;
    }
    if args.no_control {
        cfg.control.enabled = false;
    }
    cfg.validated().context("invalid configuration values")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = load_config(&args)?;
    tracing::debug!("configuration:\n{cfg:#?}");

    let state = ConfigState::with_url(cfg.manifest_url.clone());
    let gallery = Gallery::new();
    let fetcher = HttpFetcher::from_config(&cfg).context("failed to set up manifest fetcher")?;
    let loader =
        DecodingLoader::from_config(gallery.clone(), &cfg).context("failed to set up loader")?;
    let reconciler = Reconciler::new(Arc::new(gallery.clone()), Arc::new(loader))
        .with_load_timeout(cfg.load_timeout());
    let scheduler = Arc::new(PollScheduler::new(
        state.clone(),
        Arc::new(fetcher),
        reconciler,
        cfg.poll_interval(),
    ));

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            tracing::info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    let control = if cfg.control.enabled {
        let router = web::router(scheduler.clone(), gallery.clone());
        Some(web::spawn(router, cancel.clone(), cfg.control.socket_addr()))
    } else {
        None
    };

    if cfg.autostart {
        scheduler.start().context("failed to start polling")?;
    } else {
        tracing::info!("autostart disabled; waiting for a start request");
    }
    if state.url().is_empty() {
        tracing::info!("no manifest url configured yet; polling idles until one is set");
    }

    cancel.cancelled().await;

    scheduler.shutdown().await;
    tracing::info!("stopped listening for manifest changes");
    if cfg.close_on_exit {
        gallery.close_all().await;
        state.reset_fingerprint();
    }

    if let Some(handle) = control {
        if let Err(err) = handle.await {
            tracing::error!("control server join error: {err}");
        }
    }

    Ok(())
}
