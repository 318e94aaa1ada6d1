//! HTTP server for Prometheus metrics and payload health
//!
//! Runs on its own port so scrapes never compete with notification traffic.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - payload-size bucket counts as JSON
//!
//! # Example
//!
//! ```ignore
//! use viesti_gateway::metrics_server::MetricsServer;
//!
//! let health = Arc::new(PayloadHealth::default());
//! let metrics_handle = MetricsServer::start(addr, Arc::clone(&health));
//! ```

use crate::health::PayloadHealth;
use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Start the metrics server on `addr`
    ///
    /// Returns a JoinHandle that can be used to abort the server.
    /// The server runs until aborted or the process exits.
    pub fn start(addr: SocketAddr, health: Arc<PayloadHealth>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let app = Self::router(health);

            info!(%addr, "Metrics server starting");

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, %addr, "Failed to bind metrics server");
                    return;
                }
            };

            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }

    /// Routes served by the metrics listener
    pub fn router(health: Arc<PayloadHealth>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(health)
    }
}

/// Handler for /metrics endpoint
async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Handler for /health endpoint
async fn health_handler(State(health): State<Arc<PayloadHealth>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health.snapshot()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::health::BucketPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use viesti_core::HealthTracker;

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let _ = crate::metrics::Metrics::init();

        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/plain"));
    }

    #[tokio::test]
    async fn test_health_reports_bucket_counts() {
        let health = Arc::new(PayloadHealth::new(BucketPolicy::Decimal));
        health.increment_bucket(8);
        health.increment_bucket(5000);

        let response = MetricsServer::router(health)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 10_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["policy"], "decimal");
        assert_eq!(json["total"], 2);
        assert_eq!(json["buckets"][0]["count"], 1);
        assert_eq!(json["buckets"][2]["count"], 1);
    }
}
