//! `gbox-server` — HTTP control plane binary.
//!
//! Grounded on this codebase's CRI binary (`cri/src/main.rs`): a
//! `clap`-derived `Args`, `tracing_subscriber` initialized once from
//! `RUST_LOG`, then building and serving the long-running server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gbox_browser::BrowserManager;
use gbox_core::config::{ClusterMode, Config};
use gbox_core::tracker::AccessTracker;
use gbox_driver::cluster::ClusterDriver;
use gbox_driver::container::ContainerDriver;
use gbox_driver::Driver;
use gbox_server::state::AppState;
use gbox_service::{BoxService, Reclaimer};
use tracing_subscriber::EnvFilter;

/// gbox control-plane HTTP server.
#[derive(Parser, Debug)]
#[command(name = "gbox-server", about = "gbox sandbox control-plane server")]
struct Args {
    /// Path to a YAML configuration file layered under env-var overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listen port; overrides config file and GBOX_SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let base = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let mut config = base.apply_env_overrides()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        mode = ?config.cluster.mode,
        port = config.server.port,
        "starting gbox-server"
    );

    let driver: Arc<dyn Driver> = match config.cluster.mode {
        ClusterMode::Container => Arc::new(ContainerDriver::connect(
            config.container.host.as_deref(),
            &config.labels.prefix,
        )?),
        ClusterMode::Cluster => Arc::new(
            ClusterDriver::connect(
                config.cluster.cfg.as_deref(),
                &config.cluster.namespace,
                &config.labels.prefix,
            )
            .await?,
        ),
    };

    let tracker = Arc::new(AccessTracker::new());
    let box_service = Arc::new(BoxService::new(driver.clone(), tracker.clone()));
    let browser_manager = Arc::new(BrowserManager::new(
        box_service.clone(),
        config.browser.internal_port,
        PathBuf::from(&config.file.share),
    ));

    let reclaimer = Arc::new(Reclaimer::new(
        driver,
        tracker,
        std::time::Duration::from_secs(config.cluster.reclaim_stop_threshold_secs),
        std::time::Duration::from_secs(config.cluster.reclaim_delete_threshold_secs),
    ));
    let _reclaim_task = reclaimer
        .clone()
        .spawn(std::time::Duration::from_secs(config.cluster.reclaim_interval_secs));

    let state = AppState::new(
        box_service,
        browser_manager,
        reclaimer,
        config.labels.prefix.clone(),
        PathBuf::from(&config.file.share),
    );
    let app = gbox_server::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gbox-server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
