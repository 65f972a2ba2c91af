//! Prometheus exporter for the Tibber electricity API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tibber_common::LogFormat;
use tokio::sync::watch;
use tracing::{error, info};

use tibber_exporter_prometheus::{
    ExporterConfig, ExporterMetrics, HttpServer, Scraper, TibberClient,
};

/// Filter used with `--verbose`.
const VERBOSE_FILTER: &str = "info,tibber_exporter_prometheus=debug,tower_http=debug";

/// Prometheus exporter for the Tibber API.
#[derive(Parser, Debug)]
#[command(name = "tibber-exporter-prometheus")]
#[command(about = "Export Tibber prices and consumption as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Authorization token.
    #[arg(short, long, env = "TIBBER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GraphQL endpoint.
    #[arg(short, long, env = "TIBBER_ENDPOINT")]
    endpoint: Option<String>,

    /// Address and port to listen on.
    #[arg(short, long, env = "TIBBER_LISTEN")]
    listen: Option<String>,

    /// Show verbose debug information.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file (JSON5 format).
    ///
    /// A failed upstream query answers 502 by default; set
    /// `scrape: { on_fetch_error: "exit" }` to terminate the process instead.
    #[arg(short, long, env = "TIBBER_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (text, json).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

fn load_config(args: Args) -> anyhow::Result<ExporterConfig> {
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)?,
        None => ExporterConfig::default(),
    };

    if let Some(token) = args.token {
        config.api.token = token;
    }
    if let Some(endpoint) = args.endpoint {
        config.api.endpoint = endpoint;
    }
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if args.verbose > 0 {
        config.http.request_logging = true;
        config.logging.level = VERBOSE_FILTER.to_string();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let config = match load_config(parse_args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tibber_common::init_tracing(&config.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(endpoint = %config.api.endpoint, "Starting Tibber Prometheus Exporter");

    let listen_addr = config.listen_addr()?;
    let client = TibberClient::new(&config.api.endpoint, &config.api.token)?;
    let metrics = Arc::new(ExporterMetrics::new());
    let scraper = Scraper::new(client, metrics);

    let http_server = HttpServer::new(
        scraper,
        listen_addr,
        config.scrape.on_fetch_error,
        config.http.request_logging,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    tokio::select! {
        result = &mut http_task => {
            // The server only returns early when it could not start.
            return result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(Ok(Err(e))) => error!("HTTP server error: {}", e),
        Ok(Err(e)) => error!("HTTP server task failed: {}", e),
        Err(_) => error!("HTTP server did not stop within 5s"),
        Ok(Ok(Ok(()))) => {}
    }

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
