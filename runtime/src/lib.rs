//! VIESTI Runtime - process bootstrap for the gateway
//!
//! Provides [`run()`] for zero-boilerplate startup, and [`RuntimeBuilder`]
//! for callers who need control over addresses or the dispatcher.
//!
//! # Quick start
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     viesti_runtime::run().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use viesti_core::RequestHandler;
use viesti_gateway::config::{Config, LogFormat};
use viesti_gateway::dispatch::{DeliveryProfile, FanoutDispatcher};
use viesti_gateway::health::PayloadHealth;
use viesti_gateway::ingress::IngressState;
use viesti_gateway::metrics::Metrics;
use viesti_gateway::metrics_server::MetricsServer;
use viesti_gateway::pool::WorkerPool;
use viesti_gateway::profiler::RingProfiler;
use viesti_gateway::server::router;

/// Profiler shared between the dispatcher and the profile endpoint
pub type Profiler = RingProfiler<DeliveryProfile>;

type DispatcherFactory =
    Box<dyn FnOnce(&Config, Arc<Profiler>) -> anyhow::Result<Arc<dyn RequestHandler>> + Send>;

/// Run the gateway with default settings.
///
/// Loads configuration from environment variables, initialises tracing and
/// metrics, then serves notifications until SIGINT or SIGTERM.
pub async fn run() -> anyhow::Result<()> {
    RuntimeBuilder::new().run().await
}

/// Power-user builder for controlling runtime behaviour.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .listen_addr("127.0.0.1:6001".parse()?)
///     .metrics_port(9091)
///     .dispatcher(|_config, profiler| Ok(Arc::new(MyDispatcher::new(profiler))))
///     .run()
///     .await
/// ```
pub struct RuntimeBuilder {
    listen_addr: Option<SocketAddr>,
    metrics_port: Option<u16>,
    dispatcher: Option<DispatcherFactory>,
}

impl RuntimeBuilder {
    /// Create a new builder with defaults from environment variables.
    pub fn new() -> Self {
        Self {
            listen_addr: None,
            metrics_port: None,
            dispatcher: None,
        }
    }

    /// Override the notification listen address.
    ///
    /// Default: loaded from `VIESTI_LISTEN_ADDR`, or `0.0.0.0:6000`.
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Override the metrics HTTP server port.
    ///
    /// Default: the port of `VIESTI_METRICS_ADDR`, or `9090`.
    pub fn metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }

    /// Replace the HTTP fanout dispatcher.
    ///
    /// The factory receives the loaded config and the profiler served on the
    /// profile path, so a custom dispatcher can record its own entries.
    pub fn dispatcher<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&Config, Arc<Profiler>) -> anyhow::Result<Arc<dyn RequestHandler>>
            + Send
            + 'static,
    {
        self.dispatcher = Some(Box::new(factory));
        self
    }

    /// Build every component and serve until shutdown.
    ///
    /// This is the terminal method - it blocks until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        // ── 1. Load config from env ──────────────────────────────
        let mut config = Config::from_env()?;
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_addr.set_port(port);
        }

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config);

        info!(
            listen_addr = %config.listen_addr,
            metrics_addr = %config.metrics_addr,
            workers = config.workers,
            admission_timeout_ms = config.admission_timeout.as_millis() as u64,
            listeners = config.listeners.len(),
            "Starting VIESTI"
        );

        // ── 3. Health tracker, metrics + HTTP server ─────────────
        Metrics::init()?;
        let health = Arc::new(PayloadHealth::new(config.bucket_policy));
        let metrics_handle = MetricsServer::start(config.metrics_addr, Arc::clone(&health));
        info!(addr = %config.metrics_addr, "Metrics server started");

        // ── 4. Profiler, dispatcher and worker pool ──────────────
        let profiler = Arc::new(Profiler::with_order(
            config.profiler_capacity,
            config.profile_order,
        ));

        let dispatcher: Arc<dyn RequestHandler> = match self.dispatcher {
            Some(factory) => factory(&config, Arc::clone(&profiler))?,
            None => Arc::new(FanoutDispatcher::new(
                config.listeners.clone(),
                config.delivery_timeout,
                profiler.clone(),
            )?),
        };

        let pool = Arc::new(WorkerPool::new(config.pool_config()));

        // ── 5. Serve notifications ───────────────────────────────
        let state = IngressState::new(pool.clone(), dispatcher, health)
            .with_max_payload_bytes(config.max_payload_bytes);
        let app = router(&config.notify_path, &config.profile_path, state, profiler);

        let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
        info!(
            addr = %config.listen_addr,
            notify_path = %config.notify_path,
            profile_path = %config.profile_path,
            "Notification server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // ── 6. Shutdown ──────────────────────────────────────────
        pool.shutdown().await;
        metrics_handle.abort();
        info!("VIESTI shutdown complete");

        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialise the tracing subscriber based on config.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
