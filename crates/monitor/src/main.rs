use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sysops_monitor::{
    config::Config, server::Server, CollectionScheduler, MonitoringEngine, Result,
};

#[derive(Debug, Parser)]
#[command(name = "sysops-monitor", version, about = "Host monitoring and alerting engine")]
struct Args {
    /// HTTP bind address, overrides SERVER_ADDR
    #[arg(long)]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = Config::load()?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    info!(
        callback_url = %config.callbacks.base_url,
        sink = ?config.callbacks.sink,
        monitoring = ?config.monitoring,
        "Loaded configuration"
    );

    let engine = Arc::new(MonitoringEngine::from_config(&config)?);

    let mut scheduler = CollectionScheduler::new(engine.clone());
    scheduler.start();

    info!("Starting server on {}", config.server.addr);
    let served = Server::new(engine)
        .start(&config.server.addr, shutdown_signal())
        .await;

    scheduler.stop().await;
    served
}
