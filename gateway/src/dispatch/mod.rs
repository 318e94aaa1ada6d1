//! Outbound dispatch for accepted requests
//!
//! Dispatchers implement [`viesti_core::RequestHandler`] and run inside a
//! worker slot. Once a request's outcome is known they record a
//! [`DeliveryProfile`] into the server profiler.

mod fanout;

pub use fanout::FanoutDispatcher;

use serde::{Deserialize, Serialize};
use viesti_core::{ContentType, Telemetry, WorkerId};

/// Summary of one dispatched request, as served by the profile endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProfile {
    /// Worker that ran the dispatch
    pub worker_id: WorkerId,
    /// Original request path
    pub target_url: String,
    /// Payload encoding
    pub content_type: ContentType,
    /// Admission and dispatch timestamps
    pub telemetry: Telemetry,
    /// Listeners the payload was sent to
    pub listeners: usize,
    /// Listeners that answered with a 2xx
    pub delivered: usize,
    /// Listeners that failed or answered with a non-2xx
    pub failed: usize,
}
