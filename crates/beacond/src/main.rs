//! beacond — the Beacon daemon.
//!
//! Single binary that assembles the alert relay:
//! - HTTP API (`/health`, `/slack/alert`, `/homeassistant/alert`)
//! - Slack and Home Assistant notifiers
//! - Peer watcher (when peer URLs or a service name are configured)
//! - Heartbeat (when a heartbeat URL is configured)
//!
//! # Usage
//!
//! ```text
//! beacond serve --config /etc/beacon/beacon.toml --port 7867
//! beacond show-config
//! ```

mod heartbeat;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use beacon_api::{ApiState, build_router};
use beacon_core::Settings;
use beacon_notify::{Dispatcher, HomeAssistantNotifier, Notifier, SlackNotifier};
use beacon_watch::{PeerSnapshot, PeerWatcher, Resolver, WatchConfig};

/// Upper bound for any single outbound notifier or heartbeat request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "beacond", about = "Beacon alert relay daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and background tasks.
    Serve {
        /// TOML settings file; environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides APP_PORT).
        #[arg(long)]
        port: Option<u16>,

        /// Log output format.
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },
    /// Print the effective settings as JSON, secrets redacted.
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            log_format,
        } => {
            let mut settings = Settings::load(config.as_deref())
                .with_context(|| "failed to load settings")?;
            if let Some(port) = port {
                settings.app_port = port;
            }
            init_tracing(settings.debug, log_format);
            serve(settings).await
        }
        Command::ShowConfig { config } => {
            let settings = Settings::load(config.as_deref())
                .with_context(|| "failed to load settings")?;
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
            Ok(())
        }
    }
}

fn init_tracing(debug: bool, format: LogFormat) {
    let default_filter = if debug {
        "info,beacond=debug,beacon=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    info!(
        instance = %settings.beacon_instance_name,
        port = settings.app_port,
        "Beacon starting"
    );

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    // ── Notifiers ──────────────────────────────────────────────

    let slack: Arc<dyn Notifier> = Arc::new(SlackNotifier::from_settings(&settings, client.clone()));
    let home_assistant: Arc<dyn Notifier> =
        Arc::new(HomeAssistantNotifier::from_settings(&settings, client.clone()));
    let dispatcher = Dispatcher::new()
        .with_notifier(slack.clone())
        .with_notifier(home_assistant.clone());
    info!(
        platforms = ?dispatcher.platforms(),
        slack = slack.is_configured(),
        homeassistant = home_assistant.is_configured(),
        "notifiers initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // ── Background tasks ───────────────────────────────────────

    let peers = if settings.peer_watcher_enabled() {
        let watcher = PeerWatcher::new(
            WatchConfig::from_settings(&settings),
            Resolver::from_settings(&settings),
            dispatcher,
        );
        let peers = watcher.snapshot();
        tasks.push(tokio::spawn(watcher.run(shutdown_rx.clone())));
        peers
    } else {
        info!("peer watcher disabled");
        PeerSnapshot::empty()
    };

    if let Some(url) = settings.heartbeat_url.clone().filter(|_| settings.heartbeat_enabled()) {
        tasks.push(tokio::spawn(heartbeat::run_heartbeat(
            client.clone(),
            url,
            settings.heartbeat_interval,
            shutdown_rx.clone(),
        )));
    }

    // ── API server ─────────────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.app_port));
    let router = build_router(ApiState {
        settings: Arc::new(settings),
        slack,
        home_assistant,
        peers,
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for task in tasks {
        let _ = task.await;
    }

    info!("Beacon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
