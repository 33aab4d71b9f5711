use anyhow::Context;
use betchain_simulator::{Api, Config, Simulator};
use clap::Parser;
use commonware_runtime::{tokio, Metrics, Runner};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("could not read config file {}", args.config.display()))?;
    let config: Config = serde_yaml::from_str(&raw).context("could not parse config file")?;
    let mut config = config.validate().context("invalid config")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    // Initialize runtime
    let executor = tokio::Runner::new(tokio::Config::default());
    executor.start(|context| async move {
        let simulator = Arc::new(Simulator::new(context.with_label("simulator"), &config).await);
        let api = Api::new(simulator);
        let app = api.router()?;

        // Start server
        let addr = format!("0.0.0.0:{}", config.port);
        let listener = ::tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(accounts = config.wallets.len(), "Listening on {}", addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .context("axum server error")?;

        Ok::<(), anyhow::Error>(())
    })
}
