//! Error types for job submission

use std::time::Duration;
use thiserror::Error;

/// Error returned by a [`JobSubmitter`](crate::JobSubmitter)
///
/// Whatever the variant, the submitted job has been dropped without running
/// and will never run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// No worker became available within the admission bound
    #[error("no worker available within {0:?}")]
    Timeout(Duration),

    /// The pool has been shut down
    #[error("worker pool is closed")]
    Closed,
}

impl SubmitError {
    /// Short label for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            SubmitError::Timeout(_) => "admission_timeout",
            SubmitError::Closed => "pool_closed",
        }
    }
}
