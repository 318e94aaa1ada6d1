//! Admission-controlled job submission
//!
//! [`JobSubmitter`] is the backpressure boundary between inbound HTTP
//! concurrency and the bounded worker pool. The ingress handler only ever
//! sees this trait, so the pool can be swapped for a test double.

use crate::error::SubmitError;
use crate::request::WorkerId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;

/// A unit of work, invoked once with the identity of the worker running it
pub type Job = Box<dyn FnOnce(WorkerId) -> BoxFuture<'static, ()> + Send + 'static>;

/// Box an async closure as a [`Job`]
///
/// ```
/// use viesti_core::{job, WorkerId};
///
/// let work = job(|worker: WorkerId| async move {
///     let _ = worker;
/// });
/// # drop(work);
/// ```
pub fn job<F, Fut>(f: F) -> Job
where
    F: FnOnce(WorkerId) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |worker_id| Box::pin(f(worker_id)))
}

/// Submit work with a bounded wait for a worker
///
/// # Contract
///
/// - `Ok(())` means a worker has taken the job and will run it exactly once.
///   It may already have finished by the time the call returns.
/// - `Err(_)` means the job was dropped unrun and will never run later.
///   Reporting failure after executing, or executing after reporting
///   failure, is a contract violation.
/// - The call blocks the caller for at most the configured admission bound.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Hand `job` to an available worker, or fail within the bound
    async fn submit(&self, job: Job) -> Result<(), SubmitError>;
}
