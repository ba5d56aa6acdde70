//! API server.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::StakehouseConfig;
use crate::games::GameService;
use crate::metrics::MetricsRegistry;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// HTTP server wrapping the game service.
pub struct ApiServer {
    config: StakehouseConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: StakehouseConfig,
        service: Arc<GameService>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let state = Arc::new(AppState {
            service,
            metrics,
            node_id: config.server.node_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        });
        Self { config, state }
    }

    /// Start the server and block until shutdown.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = self.socket_addr()?;

        info!("Starting stakehouse API server");
        info!("   Listen: http://{}", addr);
        info!("   Fairness public key: {}", self.state.service.fairness_public_key());
        self.log_endpoints();

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // Settle any crash rounds still running so no stake is left in
        // limbo, then give the workers a moment to write.
        info!("Aborting live crash rounds before exit");
        self.state.service.crash.abort_all().await;
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        info!("API server stopped gracefully");
        Ok(())
    }

    /// Create the application with the middleware stack.
    fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // Request counting
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                track_requests,
            ))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.server.allowed_origins.clone()))
            // Timeout layer
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            // Tracing layer (last for complete request tracing)
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.server.host.parse::<std::net::IpAddr>()?,
            self.config.server.port,
        )))
    }

    fn log_endpoints(&self) {
        info!("Available endpoints:");
        info!("   GET  /health                      - Health check");
        info!("   GET  /status                      - Service status");
        info!("   POST /api/dice/play               - Play dice");
        info!("   POST /api/slots/play              - Play slots");
        info!("   POST /api/crash/start             - Start crash round");
        info!("   POST /api/crash/:id/cashout       - Cash out");
        info!("   GET  /api/crash/:id               - Round snapshot");
        info!("   GET  /ws/crash/:id                - Live round feed");
        info!("   GET  /api/balance/:user_id        - Account balance");
        info!("   GET  /api/sessions/:user_id       - Session history");
        info!("   POST /api/wallet/deposit          - Deposit");
        info!("   POST /api/wallet/withdraw         - Withdraw");
        info!("   POST /api/verify                  - Verify fairness proof");
        info!("   GET  /metrics                     - Prometheus metrics");
    }
}

async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    state.metrics.record_http_request();
    next.run(request).await
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
