//! HTTP server for the query API

use crate::api::handlers::{self, ApiState};
use crate::error::{AppError, Result};
use axum::{http::HeaderValue, http::Method, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Query API server
pub struct ApiServer {
    state: Arc<ApiState>,
    cors_origins: Vec<String>,
}

impl ApiServer {
    pub fn new(state: ApiState, cors_origins: Vec<String>) -> Self {
        Self {
            state: Arc::new(state),
            cors_origins,
        }
    }

    /// Build the router with all routes and middleware
    pub fn router(&self) -> Result<Router> {
        let cors = cors_layer(&self.cors_origins)?;

        Ok(Router::new()
            .route("/health", get(handlers::health_check))
            .route("/details/:symbol", get(handlers::get_details))
            .route("/search", get(handlers::search))
            .with_state(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http()))
    }

    /// Bind `addr` and serve until `cancel` fires
    pub async fn serve(self, addr: SocketAddr, cancel: CancellationToken) -> Result<()> {
        let app = self.router()?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Query API listening on {}", listener.local_addr()?);
        info!("  GET  http://{}/health", addr);
        info!("  GET  http://{}/details/{{symbol}}", addr);
        info!("  GET  http://{}/search?query={{text}}&limit={{n}}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("Query API shutting down");
            })
            .await?;

        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| AppError::Config(format!("Invalid CORS origin: {}", o)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers(Any))
}
