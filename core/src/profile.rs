//! Server profiler trait

use serde::Serialize;

/// Bounded, rolling record of recently processed requests
///
/// Entries are opaque to the profiler: it stores and reports them, never
/// inspects them. `record` is called by the dispatcher once an outcome is
/// known; the ingress path never records.
pub trait ServerProfiler: Send + Sync {
    /// Entry type stored by this profiler
    type Entry: Serialize + Clone + Send + Sync + 'static;

    /// Store `entry`, evicting the oldest entry once at capacity
    fn record(&self, entry: Self::Entry);

    /// Snapshot of the retained entries in the configured order
    ///
    /// Never blocks indefinitely and never exposes a partially written
    /// entry. Returns an empty vector when nothing has been recorded.
    fn report(&self) -> Vec<Self::Entry>;
}
