//! Request dispatcher trait
//!
//! The [`RequestHandler`] performs outbound fanout for one request on one
//! worker. It is only ever invoked from inside a submitted job.

use crate::request::{Request, WorkerId};
use async_trait::async_trait;

/// Outbound delivery for a single accepted request
///
/// # Implementation Requirements
///
/// - Must be `Send + Sync`; one instance is shared by every worker
/// - Owns delivery policy entirely (timeouts, fanout, failure handling).
///   Nothing is reported back to the ingress path, which has already
///   answered the client by the time this runs
/// - Expected to record a summary into the server profiler once the
///   outcome is known
///
/// # Example
///
/// ```ignore
/// use viesti_core::{Request, RequestHandler, WorkerId};
/// use async_trait::async_trait;
///
/// struct LogHandler;
///
/// #[async_trait]
/// impl RequestHandler for LogHandler {
///     async fn handle_request(&self, worker_id: WorkerId, request: Request) {
///         tracing::info!(%worker_id, size = request.raw_payload_size(), "got request");
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Deliver `request` using the worker slot `worker_id`
    async fn handle_request(&self, worker_id: WorkerId, request: Request);
}
