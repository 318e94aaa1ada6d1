//! Convenience re-exports for embedding the gateway.
//!
//! ```rust
//! use viesti_runtime::prelude::*;
//! ```

// Core contracts
pub use viesti_core::{
    ContentType, HealthTracker, Job, JobSubmitter, Request, RequestHandler, ServerProfiler,
    SubmitError, Telemetry, WorkerId, job,
};

// Gateway components
pub use viesti_gateway::{
    BucketPolicy, Config, DeliveryProfile, FanoutDispatcher, IngressState, PayloadHealth,
    PoolConfig, ReportOrder, RingProfiler, WorkerPool, router,
};

// Error types
pub use viesti_gateway::{GatewayError, IngressRejection};

// Zero-copy payload
pub use bytes::Bytes;

// Runtime
pub use crate::{Profiler, RuntimeBuilder};
