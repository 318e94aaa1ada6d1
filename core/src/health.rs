//! Payload health tracking trait

/// Counts accepted payloads by size bucket
///
/// Implementations map `size` to a bucket with a fixed, deterministic,
/// monotonic function and must tolerate any number of concurrent callers
/// without losing or double-counting an increment. Counts only grow.
pub trait HealthTracker: Send + Sync {
    /// Record one accepted payload of `size` bytes
    fn increment_bucket(&self, size: usize);
}
