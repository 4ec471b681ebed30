use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tollgate::config::{LogFormat, TollgateConfig};
use tollgate::console::{spawn_idle_sweeper, Session};
use tollgate::ratelimit::RateLimiter;

/// Per-key admission control over a line protocol on stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "tollgate", version, about)]
struct Args {
    /// YAML configuration file; TOLLGATE_* environment variables override it
    #[arg(short, long)]
    config: Option<String>,

    /// Log output format (overrides the configuration file)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = TollgateConfig::load(args.config.as_deref())?;

    // Initialize tracing; logs go to stderr so stdout carries only replies
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    match args.log_format.unwrap_or(config.console.log_format) {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    info!("Starting Tollgate admission control");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let policy = config.limiter.to_policy()?;
    info!(strategy = %policy.strategy, max_requests = policy.max_requests, "Configuration loaded");

    let rate_limiter = Arc::new(RateLimiter::new(policy)?);
    info!("Rate limiter initialized");

    let sweeper = spawn_idle_sweeper(Arc::clone(&rate_limiter), config.limiter.sweep_interval());

    let session = Session::new(rate_limiter);
    let stdin = BufReader::new(tokio::io::stdin());
    session
        .serve_with_shutdown(stdin, tokio::io::stdout(), shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Tollgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
