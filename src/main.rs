//! Stakehouse server binary.

use clap::Parser;
use stakehouse::{
    api::ApiServer, config::StakehouseConfig, FairnessEngine, GameService, LedgerStore,
    MemoryLedger, MetricsRegistry,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "stakehouse")]
#[command(about = "Provably fair casino game service", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Server host override
    #[arg(long)]
    host: Option<String>,

    /// Server port override
    #[arg(long)]
    port: Option<u16>,

    /// Allowed CORS origins (comma-separated, use * for all)
    #[arg(long)]
    cors_origins: Option<String>,

    /// Run with demo defaults (accounts start funded)
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => StakehouseConfig::from_file(path)?,
        None if args.demo => StakehouseConfig::demo(),
        None => StakehouseConfig::default(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(origins) = args.cors_origins {
        config.server.allowed_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_filter)),
        )
        .init();

    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new(config.ledger.clone()));
    let fairness = Arc::new(FairnessEngine::new_random());
    let metrics = Arc::new(MetricsRegistry::new());
    let service = Arc::new(GameService::new(
        ledger,
        fairness,
        metrics.clone(),
        config.games.clone(),
    ));

    ApiServer::new(config, service, metrics).run().await
}
