use crate::aggregator::Aggregator;
use crate::config::{Config, StoreBackend};
use crate::error::{ClickError, Result};
use crate::handlers::{
    get_clicks, get_rate_limit_status, health_check, post_click, readiness_check, AppState,
};
use crate::middleware::{enforce_rate_limit, request_context};
use crate::service::ClickService;
use crate::store::{MemoryStore, RedisStore, SharedStore};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router. Rate limiting applies to `POST /api/click` only.
pub fn create_app(state: AppState) -> Router {
    let click = post(post_click).route_layer(middleware::from_fn_with_state(
        state.clone(),
        enforce_rate_limit,
    ));

    Router::new()
        .route("/api/click", click)
        .route("/api/clicks", get(get_clicks))
        .route("/api/rate-limit-status", get(get_rate_limit_status))
        // Health and readiness endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(state.clone(), request_context)),
        )
        .with_state(state)
}

pub struct Server {
    config: Config,
    store: SharedStore,
}

impl Server {
    /// Open the configured store. Failing to reach it is fatal at startup.
    pub async fn connect(config: Config) -> Result<Self> {
        let store: SharedStore = match config.store_backend {
            StoreBackend::Redis => Arc::new(
                RedisStore::connect(
                    &config.redis_url,
                    config.store_connect_timeout(),
                    config.store_command_timeout(),
                )
                .await
                .map_err(ClickError::store("Could not connect to Redis"))?,
            ),
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; counters are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: SharedStore) -> Self {
        Self { config, store }
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then stop the
    /// aggregator once in-flight requests have drained.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let aggregator = Aggregator::new(self.store.clone(), self.config.poll_interval()).spawn();

        let service = ClickService::new(self.store.clone(), self.config.rate_limit());
        let app = create_app(AppState::new(service, self.config.trust_proxy_headers));

        tracing::info!("Server running on {}", local_addr);
        tracing::info!("Health check available at /health");

        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        aggregator.shutdown().await;
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
