//! pharosd — HTTP front end for the audit execution coordinator.
//!
//! Serves `GET /audit?url=&type=` by driving a single shared headless
//! browser through the external auditing engine, one audit at a time.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pharos_core::{load_pharos_config, AuditCoordinator, AuditService};

mod api;
mod error;

#[derive(Parser, Debug)]
#[command(name = "pharosd", about = "Web-page performance audit service")]
struct Args {
    /// Path to pharos.toml
    #[arg(long, default_value = "configs/pharos.toml")]
    config: PathBuf,

    /// Bind address override
    #[arg(long)]
    host: Option<String>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn AuditService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_pharos_config(&args.config)?;
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let coordinator = AuditCoordinator::from_config(&config)?;
    let supervisor = coordinator.supervisor();
    let state = AppState {
        service: Arc::new(coordinator),
    };
    let app = api::router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("pharosd v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start the browser launch now so the first audit skips the cold start;
    // audits still ensure readiness themselves, this is only a head start.
    tokio::spawn(async move {
        if let Err(err) = supervisor.ensure_ready().await {
            warn!(error = %err, "eager browser launch failed");
        }
    });

    axum::serve(listener, app).await?;
    Ok(())
}
