//! VIESTI - notification ingestion gateway
//!
//! Accepts notifications over HTTP, admits each one to a bounded worker
//! pool within a fixed wait, and fans accepted payloads out to listeners.
//!
//! # Request flow
//!
//! ```text
//! POST ──► ingress ──► WorkerPool (admission) ──► dispatcher ──► listeners
//!             │                                        │
//!             └─► PayloadHealth (on accept)            └─► RingProfiler ──► GET profile
//! ```
//!
//! The ingress handler only sees the `viesti-core` traits, so any stage can
//! be swapped for a test double or a custom implementation.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod ingress;
pub mod metrics;
pub mod metrics_server;
pub mod pool;
pub mod profiler;
pub mod report;
pub mod server;

pub use config::{Config, LogFormat};
pub use dispatch::{DeliveryProfile, FanoutDispatcher};
pub use error::{GatewayError, Result};
pub use health::{BucketPolicy, HealthSnapshot, PayloadHealth};
pub use ingress::{IngressRejection, IngressState, ingress_handler};
pub use metrics_server::MetricsServer;
pub use pool::{PoolConfig, WorkerPool};
pub use profiler::{ReportOrder, RingProfiler};
pub use report::profile_handler;
pub use server::router;
